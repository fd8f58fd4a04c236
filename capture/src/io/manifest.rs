//! Per-task manifest (`<task dir>/manifest.json`).
//!
//! The manifest is the durable product output: it correlates captured
//! screenshots with executed steps and records the terminal status. It is
//! written as pretty JSON with a stable field order so runs can be diffed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{PlanProvenance, StepOutcome, TaskStatus};

pub const MANIFEST_FILE: &str = "manifest.json";

const MAX_TASK_DIR_ATTEMPTS: u32 = 1000;

/// Screenshot metadata. Sequence numbers are 1-based and gapless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenshotEntry {
    pub sequence: u32,
    pub step_ordinal: u32,
    pub name: String,
    pub outcome: StepOutcome,
    /// Image path relative to the task directory; `None` when nothing could be captured.
    pub file: Option<PathBuf>,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub task: String,
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub plan_provenance: Option<PlanProvenance>,
    pub status: TaskStatus,
    pub screenshots_count: usize,
    pub screenshots: Vec<ScreenshotEntry>,
    pub profile_store: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Manifest {
    /// Empty manifest for a task that has not captured anything yet.
    pub fn new(task: &str, executed_at: DateTime<Utc>) -> Self {
        Self {
            task: task.to_string(),
            app_id: None,
            app_name: None,
            executed_at,
            plan_provenance: None,
            status: TaskStatus::Partial,
            screenshots_count: 0,
            screenshots: Vec::new(),
            profile_store: None,
            error: None,
        }
    }

    pub fn push(&mut self, entry: ScreenshotEntry) {
        self.screenshots.push(entry);
        self.screenshots_count = self.screenshots.len();
    }
}

/// Atomically write the manifest (temp file + rename).
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    debug!(path = %path.display(), screenshots = manifest.screenshots_count, status = ?manifest.status, "writing manifest");
    let mut buf = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("manifest path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp manifest {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace manifest {}", path.display()))?;
    Ok(())
}

/// Create a fresh task directory under `output_dir`.
///
/// The directory is named `base_id`, or `base_id_2`, `base_id_3`, ... when an
/// earlier task already holds the name. Returns the id actually used and the
/// directory path. Existing task directories are never reused.
pub fn reserve_task_dir(output_dir: &Path, base_id: &str) -> Result<(String, PathBuf)> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create directory {}", output_dir.display()))?;
    for attempt in 1..=MAX_TASK_DIR_ATTEMPTS {
        let task_id = if attempt == 1 {
            base_id.to_string()
        } else {
            format!("{base_id}_{attempt}")
        };
        let dir = output_dir.join(&task_id);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((task_id, dir)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(task_id = %task_id, "task directory taken; trying next suffix");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("create directory {}", dir.display()));
            }
        }
    }
    bail!(
        "no free task directory for {base_id} under {} after {MAX_TASK_DIR_ATTEMPTS} attempts",
        output_dir.display()
    )
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single().expect("time")
    }

    #[test]
    fn manifest_layout_is_stable() {
        let mut manifest = Manifest::new("Create a project in Linear", fixed_time());
        manifest.app_id = Some("linear".to_string());
        manifest.app_name = Some("Linear".to_string());
        manifest.plan_provenance = Some(PlanProvenance::OnDemandFallback);
        manifest.status = TaskStatus::Success;
        manifest.push(ScreenshotEntry {
            sequence: 1,
            step_ordinal: 1,
            name: "step_1".to_string(),
            outcome: StepOutcome::Success,
            file: Some(PathBuf::from("01_step_1.png")),
            captured_at: fixed_time(),
            error: None,
        });

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(MANIFEST_FILE);
        write_manifest(&path, &manifest).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        let expected = r#"{
  "task": "Create a project in Linear",
  "app_id": "linear",
  "app_name": "Linear",
  "executed_at": "2025-01-02T03:04:05Z",
  "plan_provenance": "ON_DEMAND_FALLBACK",
  "status": "SUCCESS",
  "screenshots_count": 1,
  "screenshots": [
    {
      "sequence": 1,
      "step_ordinal": 1,
      "name": "step_1",
      "outcome": "SUCCESS",
      "file": "01_step_1.png",
      "captured_at": "2025-01-02T03:04:05Z"
    }
  ],
  "profile_store": null
}
"#;
        assert_eq!(contents, expected);
        assert_eq!(load_manifest(&path).expect("load"), manifest);
    }

    #[test]
    fn reserved_task_dirs_never_collide() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output_dir = temp.path().join("outputs");

        let (first_id, first_dir) =
            reserve_task_dir(&output_dir, "20250102_030405").expect("first");
        let (second_id, second_dir) =
            reserve_task_dir(&output_dir, "20250102_030405").expect("second");
        let (third_id, _) = reserve_task_dir(&output_dir, "20250102_030405").expect("third");

        assert_eq!(first_id, "20250102_030405");
        assert_eq!(second_id, "20250102_030405_2");
        assert_eq!(third_id, "20250102_030405_3");
        assert_ne!(first_dir, second_dir);
        assert!(first_dir.is_dir());
        assert!(second_dir.is_dir());
    }
}
