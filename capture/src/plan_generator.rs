//! Documentation-grounded plan generation, run concurrently with login.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::core::plan::plan_from_steps;
use crate::core::types::{Plan, PlanProvenance};
use crate::handoff::PlanPublisher;
use crate::io::planner::PlanSummarizer;
use crate::io::search::SearchService;

/// Input for one grounded planning attempt.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub task: String,
    pub app_id: String,
    pub deadline: Instant,
}

/// Search query sent for a task.
pub fn compose_query(task: &str, app_id: &str) -> String {
    format!("{app_id} how to {}", task.trim())
}

/// Search + summarize. Never touches the browser or the login session.
#[derive(Clone)]
pub struct PlanGenerator {
    search: Arc<dyn SearchService>,
    summarizer: Arc<dyn PlanSummarizer>,
    max_documents: usize,
}

impl PlanGenerator {
    pub fn new(
        search: Arc<dyn SearchService>,
        summarizer: Arc<dyn PlanSummarizer>,
        max_documents: usize,
    ) -> Self {
        Self {
            search,
            summarizer,
            max_documents,
        }
    }

    /// Produce a grounded plan, or an error describing why none is available.
    ///
    /// Steps are kept exactly as the summarizer returned them; an empty or
    /// malformed sequence is an error, never a degenerate plan.
    pub async fn generate(&self, request: &PlanRequest) -> Result<Plan> {
        let query = compose_query(&request.task, &request.app_id);
        let mut documents = self
            .search
            .search(&query)
            .await
            .with_context(|| format!("search `{query}`"))?;
        if documents.is_empty() {
            return Err(anyhow!("search `{query}` returned no documents"));
        }
        documents.truncate(self.max_documents);
        debug!(documents = documents.len(), "summarizing grounded plan");

        let steps = self
            .summarizer
            .summarize(&request.task, &request.app_id, Some(&documents))
            .await
            .context("summarize grounded plan")?;
        plan_from_steps(steps, PlanProvenance::DocumentationGrounded)
            .map_err(|reason| anyhow!("summarizer returned an unusable plan: {reason}"))
    }

    /// Run [`PlanGenerator::generate`] in the background, bounded by the request
    /// deadline, and publish the plan only on success.
    ///
    /// Failures are logged and leave the slot empty; the caller reads that as
    /// not ready and falls back.
    pub fn spawn(&self, request: PlanRequest, publisher: PlanPublisher) -> JoinHandle<()> {
        let generator = self.clone();
        let span = info_span!("plan_generator", app_id = %request.app_id);
        tokio::spawn(
            async move {
                let started = Instant::now();
                match tokio::time::timeout_at(request.deadline, generator.generate(&request)).await
                {
                    Ok(Ok(plan)) => {
                        let steps = plan.steps.len();
                        if publisher.publish(plan) {
                            info!(steps, elapsed_ms = started.elapsed().as_millis() as u64, "grounded plan ready");
                        } else {
                            debug!(steps, "grounded plan arrived after the slot was read; discarded");
                        }
                    }
                    Ok(Err(err)) => warn!(error = %format!("{err:#}"), "plan generation failed"),
                    Err(_) => warn!("plan generation hit the task deadline"),
                }
            }
            .instrument(span),
        )
    }
}
