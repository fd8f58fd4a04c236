//! Top-level orchestrator phases and terminal status derivation.

use crate::core::types::{StopReason, TaskStatus};

/// Orchestrator state machine for one task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorPhase {
    Idle,
    DetectingApp,
    Authenticating,
    PlanReadyCheck,
    Executing,
    Finalizing,
    Done,
    TimedOut,
    Failed,
}

impl OrchestratorPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrchestratorPhase::Done | OrchestratorPhase::TimedOut | OrchestratorPhase::Failed
        )
    }

    pub fn can_transition_to(self, next: OrchestratorPhase) -> bool {
        use OrchestratorPhase::{
            Authenticating, DetectingApp, Done, Executing, Failed, Finalizing, Idle,
            PlanReadyCheck, TimedOut,
        };
        match (self, next) {
            (Idle, DetectingApp) => true,
            (DetectingApp, Authenticating | Failed) => true,
            (Authenticating, PlanReadyCheck | Finalizing) => true,
            (PlanReadyCheck, Executing) => true,
            (Executing, Finalizing) => true,
            (Finalizing, Done | TimedOut | Failed) => true,
            _ => false,
        }
    }

    /// Terminal phase matching a task status.
    pub fn terminal_for(status: TaskStatus) -> OrchestratorPhase {
        match status {
            TaskStatus::Success | TaskStatus::Partial => OrchestratorPhase::Done,
            TaskStatus::TimedOut => OrchestratorPhase::TimedOut,
            TaskStatus::Failed => OrchestratorPhase::Failed,
        }
    }
}

/// Terminal status from how execution stopped.
///
/// Soft failures do not downgrade a completed run.
pub fn derive_status(stop: StopReason) -> TaskStatus {
    match stop {
        StopReason::Completed => TaskStatus::Success,
        StopReason::HardFailure { .. } => TaskStatus::Partial,
        StopReason::TimedOut => TaskStatus::TimedOut,
    }
}
