//! Per-step screenshot capture and incremental manifest writing.
//!
//! Sequence numbers come from the count of screenshots already recorded for the
//! task, never from the clock, so numbering is gapless and follows trace order.
//! Every trace entry gets a number, including entries whose image could not be
//! obtained.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use crate::core::types::{PlanProvenance, TaskStatus, TraceEntry};
use crate::io::agent::UiAgent;
use crate::io::manifest::{MANIFEST_FILE, Manifest, ScreenshotEntry, write_manifest};

/// Owns the task directory and the in-progress manifest.
#[derive(Debug)]
pub struct CapturePipeline {
    task_dir: PathBuf,
    manifest: Manifest,
    snapshot_timeout: Duration,
}

/// Image file name for a sequence number and step.
pub fn screenshot_file_name(sequence: u32, ordinal: u32) -> String {
    format!("{sequence:02}_step_{ordinal}.png")
}

impl CapturePipeline {
    pub fn new(task_dir: PathBuf, manifest: Manifest, snapshot_timeout: Duration) -> Self {
        Self {
            task_dir,
            manifest,
            snapshot_timeout,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.task_dir.join(MANIFEST_FILE)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn screenshots_written(&self) -> usize {
        self.manifest.screenshots.len()
    }

    pub fn set_plan_provenance(&mut self, provenance: PlanProvenance) {
        self.manifest.plan_provenance = Some(provenance);
    }

    /// Record one trace entry. Never fails: a missing image still consumes a
    /// sequence number and carries an `error` note.
    pub async fn capture(&mut self, entry: &TraceEntry, agent: &dyn UiAgent) -> ScreenshotEntry {
        let sequence = self.manifest.screenshots.len() as u32 + 1;
        let ordinal = entry.step.ordinal;

        let (bytes, mut error) = match &entry.snapshot {
            Some(bytes) => (Some(bytes.clone()), None),
            None => self.fallback_snapshot(agent).await,
        };

        let mut file = None;
        if let Some(bytes) = bytes {
            let name = screenshot_file_name(sequence, ordinal);
            match write_image(&self.task_dir.join(&name), &bytes) {
                Ok(()) => file = Some(PathBuf::from(name)),
                Err(err) => {
                    warn!(sequence, error = %format!("{err:#}"), "could not write screenshot");
                    error = Some(format!("{err:#}"));
                }
            }
        }

        let screenshot = ScreenshotEntry {
            sequence,
            step_ordinal: ordinal,
            name: format!("step_{ordinal}"),
            outcome: entry.outcome,
            file,
            captured_at: Utc::now(),
            error,
        };
        self.manifest.push(screenshot.clone());
        debug!(sequence, ordinal, outcome = ?entry.outcome, "captured step");

        if let Err(err) = self.checkpoint() {
            warn!(sequence, error = %format!("{err:#}"), "could not checkpoint manifest");
        }
        screenshot
    }

    async fn fallback_snapshot(&self, agent: &dyn UiAgent) -> (Option<Vec<u8>>, Option<String>) {
        match tokio::time::timeout(self.snapshot_timeout, agent.snapshot()).await {
            Ok(Ok(bytes)) => (Some(bytes), None),
            Ok(Err(err)) => (None, Some(format!("snapshot failed: {err:#}"))),
            Err(_) => (
                None,
                Some(format!("snapshot timed out after {:?}", self.snapshot_timeout)),
            ),
        }
    }

    /// Persist the manifest as it stands, marked `PARTIAL`.
    fn checkpoint(&self) -> Result<()> {
        let mut snapshot = self.manifest.clone();
        snapshot.status = TaskStatus::Partial;
        write_manifest(&self.manifest_path(), &snapshot)
    }

    /// Write the terminal manifest and hand it back.
    pub fn finalize(mut self, status: TaskStatus, error: Option<String>) -> Result<Manifest> {
        self.manifest.status = status;
        self.manifest.error = error;
        write_manifest(&self.manifest_path(), &self.manifest)?;
        Ok(self.manifest)
    }
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}
