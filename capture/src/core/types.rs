//! Shared deterministic types for the capture core.
//!
//! These types define stable contracts between orchestration components and the
//! persisted manifest. Serialized values use `SCREAMING_SNAKE_CASE` so manifests
//! stay diff-able across runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One atomic instruction for the UI-driving agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Sole ordering key within a plan (1-based by convention).
    pub ordinal: u32,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<String>,
}

impl Step {
    pub fn new(ordinal: u32, instruction: impl Into<String>) -> Self {
        Self {
            ordinal,
            instruction: instruction.into(),
            expected_outcome: None,
        }
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanProvenance {
    /// Produced in parallel with login, grounded in retrieved documentation.
    DocumentationGrounded,
    /// Produced on demand after login because no grounded plan was ready.
    OnDemandFallback,
}

/// Ordered steps plus provenance. Exactly one plan drives each task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub provenance: PlanProvenance,
}

/// Classified result of dispatching one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    Success,
    /// The step had no observable effect; execution continues.
    SoftFailure,
    /// Unrecoverable agent error; remaining steps are skipped.
    HardFailure,
}

/// A search result handed to the plan summarizer as grounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// One executed step and what the agent reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub step: Step,
    pub outcome: StepOutcome,
    /// Raw UI state (PNG bytes) returned with the dispatch, if any.
    pub snapshot: Option<Vec<u8>>,
    pub detail: Option<String>,
}

/// Append-only record of executed steps in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Terminal status recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Partial,
    TimedOut,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Partial => "PARTIAL",
            TaskStatus::TimedOut => "TIMED_OUT",
            TaskStatus::Failed => "FAILED",
        }
    }
}

/// Why the execution engine stopped issuing steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every step in the plan was dispatched.
    Completed,
    /// A step reported an unrecoverable error.
    HardFailure { ordinal: u32 },
    /// The global deadline passed before the plan finished.
    TimedOut,
}

/// Summary of one task invocation; also the `history.jsonl` record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResult {
    pub task_id: String,
    pub task: String,
    pub status: TaskStatus,
    pub app_id: Option<String>,
    pub plan_provenance: Option<PlanProvenance>,
    pub steps_executed: usize,
    pub screenshots: usize,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub error: Option<String>,
}
