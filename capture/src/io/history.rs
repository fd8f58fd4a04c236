//! Task history (`<output_dir>/history.jsonl`), one JSON line per task.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::TaskResult;

pub const HISTORY_FILE: &str = "history.jsonl";

pub fn append_history(path: &Path, result: &TaskResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(result).context("serialize history entry")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))
}

/// Read all history entries; a missing file is an empty history.
pub fn load_history(path: &Path) -> Result<Vec<TaskResult>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PlanProvenance, TaskStatus};
    use std::path::PathBuf;

    fn result(task_id: &str, status: TaskStatus) -> TaskResult {
        TaskResult {
            task_id: task_id.to_string(),
            task: "Create an issue in GitHub".to_string(),
            status,
            app_id: Some("github".to_string()),
            plan_provenance: Some(PlanProvenance::DocumentationGrounded),
            steps_executed: 2,
            screenshots: 2,
            output_dir: PathBuf::from("outputs").join(task_id),
            manifest_path: PathBuf::from("outputs").join(task_id).join("manifest.json"),
            error: None,
        }
    }

    #[test]
    fn missing_history_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let entries = load_history(&temp.path().join(HISTORY_FILE)).expect("load");
        assert!(entries.is_empty());
    }

    #[test]
    fn appends_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join(HISTORY_FILE);
        append_history(&path, &result("20250101_000001", TaskStatus::Success)).expect("append");
        append_history(&path, &result("20250101_000002", TaskStatus::TimedOut)).expect("append");

        let entries = load_history(&path).expect("load");
        let ids: Vec<&str> = entries.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, vec!["20250101_000001", "20250101_000002"]);
        assert_eq!(entries[1].status, TaskStatus::TimedOut);
    }
}
