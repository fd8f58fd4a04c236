//! Step-by-step plan execution against the UI agent.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::capture::CapturePipeline;
use crate::core::budget::{deadline_passed, remaining_budget};
use crate::core::plan::{plan_from_steps, single_step_plan};
use crate::core::types::{ExecutionTrace, Plan, PlanProvenance, Step, StepOutcome, StopReason, TraceEntry};
use crate::io::agent::UiAgent;
use crate::io::planner::PlanSummarizer;

/// What happened during execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// The single plan that drove execution.
    pub plan: Plan,
    pub trace: ExecutionTrace,
    pub stop: StopReason,
}

/// Consumes a plan (or builds the fallback one) and drives the agent.
#[derive(Clone)]
pub struct ExecutionEngine {
    agent: Arc<dyn UiAgent>,
    summarizer: Arc<dyn PlanSummarizer>,
    step_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(
        agent: Arc<dyn UiAgent>,
        summarizer: Arc<dyn PlanSummarizer>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            agent,
            summarizer,
            step_timeout,
        }
    }

    /// Execute `ready` if present, otherwise an on-demand fallback plan.
    ///
    /// Every trace entry is captured exactly once, in order. No new step is
    /// dispatched once `deadline` has passed; a step already in flight is
    /// allowed to finish (bounded by the per-step timeout).
    #[instrument(skip_all, fields(app_id = %app_id, grounded = ready.is_some()))]
    pub async fn execute(
        &self,
        ready: Option<Plan>,
        task: &str,
        app_id: &str,
        capture: &mut CapturePipeline,
        deadline: Instant,
    ) -> ExecutionReport {
        let plan = match ready {
            Some(plan) => plan,
            None => self.fallback_plan(task, app_id, deadline).await,
        };
        capture.set_plan_provenance(plan.provenance);
        info!(steps = plan.steps.len(), provenance = ?plan.provenance, "executing plan");

        let mut trace = ExecutionTrace::new();
        let mut stop = StopReason::Completed;
        for step in &plan.steps {
            if deadline_passed(deadline) {
                warn!(next_ordinal = step.ordinal, "task deadline passed; no further steps");
                stop = StopReason::TimedOut;
                break;
            }
            let entry = self.dispatch(step).await;
            let outcome = entry.outcome;
            capture.capture(&entry, self.agent.as_ref()).await;
            trace.push(entry);

            match outcome {
                StepOutcome::Success => {}
                StepOutcome::SoftFailure => {
                    info!(ordinal = step.ordinal, "step had no effect; continuing");
                }
                StepOutcome::HardFailure => {
                    warn!(ordinal = step.ordinal, "unrecoverable step failure; aborting plan");
                    stop = StopReason::HardFailure {
                        ordinal: step.ordinal,
                    };
                    break;
                }
            }
        }

        ExecutionReport { plan, trace, stop }
    }

    /// Ungrounded plan from the same summarizer; degrades to a single step
    /// carrying the task text when the summarizer cannot produce one in time.
    async fn fallback_plan(&self, task: &str, app_id: &str, deadline: Instant) -> Plan {
        info!("no grounded plan ready; requesting on-demand plan");
        let reason = match remaining_budget(deadline) {
            Ok(budget) => {
                let result =
                    tokio::time::timeout(budget, self.summarizer.summarize(task, app_id, None))
                        .await;
                match result {
                    Ok(Ok(steps)) => {
                        match plan_from_steps(steps, PlanProvenance::OnDemandFallback) {
                            Ok(plan) => return plan,
                            Err(reason) => reason,
                        }
                    }
                    Ok(Err(err)) => format!("{err:#}"),
                    Err(_) => "task deadline passed".to_string(),
                }
            }
            Err(err) => err.to_string(),
        };
        warn!(reason = %reason, "on-demand plan unavailable; using the task as a single step");
        single_step_plan(task)
    }

    async fn dispatch(&self, step: &Step) -> TraceEntry {
        match tokio::time::timeout(self.step_timeout, self.agent.dispatch(step)).await {
            Ok(Ok(report)) => TraceEntry {
                step: step.clone(),
                outcome: report.outcome,
                snapshot: report.snapshot,
                detail: report.detail,
            },
            Ok(Err(err)) => TraceEntry {
                step: step.clone(),
                outcome: StepOutcome::HardFailure,
                snapshot: None,
                detail: Some(format!("{err:#}")),
            },
            Err(_) => TraceEntry {
                step: step.clone(),
                outcome: StepOutcome::SoftFailure,
                snapshot: None,
                detail: Some(format!("step timed out after {:?}", self.step_timeout)),
            },
        }
    }
}
