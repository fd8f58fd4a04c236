//! Top-level task state machine.
//!
//! One [`Orchestrator::run`] call owns everything about a task: it detects the
//! app, runs login and grounded planning concurrently, reconciles whichever
//! plan is ready when login completes, executes it, and finalizes the manifest.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{Local, Utc};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::capture::CapturePipeline;
use crate::core::phase::{OrchestratorPhase, derive_status};
use crate::core::registry::{AppProfile, AppRegistry};
use crate::core::types::{StopReason, TaskResult, TaskStatus};
use crate::engine::{ExecutionEngine, ExecutionReport};
use crate::handoff::plan_handoff;
use crate::io::agent::{Credentials, UiAgent};
use crate::io::history::{HISTORY_FILE, append_history};
use crate::io::manifest::{MANIFEST_FILE, Manifest, reserve_task_dir};
use crate::io::planner::PlanSummarizer;
use crate::io::profile_store::ProfileStore;
use crate::io::search::SearchService;
use crate::login::{LoginController, LoginFailure};
use crate::plan_generator::{PlanGenerator, PlanRequest};

/// No registered app id occurs in the task text.
#[derive(Debug, Error)]
#[error("no supported app mentioned in the task (supported: {})", .supported.join(", "))]
pub struct AppDetectionError {
    pub supported: Vec<String>,
}

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub agent: Arc<dyn UiAgent>,
    pub search: Arc<dyn SearchService>,
    pub summarizer: Arc<dyn PlanSummarizer>,
    pub profiles: Arc<dyn ProfileStore>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Parent of per-task output directories.
    pub output_dir: PathBuf,
    pub step_timeout: Duration,
    pub max_documents: usize,
}

pub struct Orchestrator {
    registry: AppRegistry,
    collaborators: Collaborators,
    login: LoginController,
    generator: PlanGenerator,
    engine: ExecutionEngine,
    settings: OrchestratorSettings,
}

/// Tracks the current phase and rejects illegal transitions.
struct PhaseTracker {
    phase: OrchestratorPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: OrchestratorPhase::Idle,
        }
    }

    fn enter(&mut self, next: OrchestratorPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            bail!("illegal orchestrator transition {:?} -> {next:?}", self.phase);
        }
        info!(from = ?self.phase, to = ?next, "phase");
        self.phase = next;
        Ok(())
    }
}

impl Orchestrator {
    pub fn new(
        registry: AppRegistry,
        collaborators: Collaborators,
        credentials: Credentials,
        settings: OrchestratorSettings,
    ) -> Self {
        let login = LoginController::new(
            collaborators.agent.clone(),
            collaborators.profiles.clone(),
            credentials,
        );
        let generator = PlanGenerator::new(
            collaborators.search.clone(),
            collaborators.summarizer.clone(),
            settings.max_documents,
        );
        let engine = ExecutionEngine::new(
            collaborators.agent.clone(),
            collaborators.summarizer.clone(),
            settings.step_timeout,
        );
        Self {
            registry,
            collaborators,
            login,
            generator,
            engine,
            settings,
        }
    }

    /// Run one task to a terminal status.
    ///
    /// Returns `Err` only when the task directory or the final manifest cannot
    /// be written; every task outcome, including failures, is reported through
    /// [`TaskResult`].
    #[instrument(skip_all, fields(task_id = tracing::field::Empty))]
    pub async fn run(&self, task: &str) -> Result<TaskResult> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (task_id, task_dir) = reserve_task_dir(&self.settings.output_dir, &stamp)?;
        tracing::Span::current().record("task_id", task_id.as_str());
        let mut phases = PhaseTracker::new();

        phases.enter(OrchestratorPhase::DetectingApp)?;
        let mut manifest = Manifest::new(task, Utc::now());
        let Some(profile) = self.registry.detect(task) else {
            let err = AppDetectionError {
                supported: self.registry.ids().into_iter().map(str::to_string).collect(),
            };
            error!(error = %err, "app detection failed");
            let capture = CapturePipeline::new(task_dir, manifest, self.settings.step_timeout);
            phases.enter(OrchestratorPhase::Failed)?;
            let manifest = capture.finalize(TaskStatus::Failed, Some(err.to_string()))?;
            return self.report(task_id, &manifest, 0);
        };
        info!(app_id = %profile.id, app = %profile.name, "detected app");
        manifest.app_id = Some(profile.id.clone());
        manifest.app_name = Some(profile.name.clone());
        manifest.profile_store = Some(self.collaborators.profiles.location(&profile.id));
        let mut capture = CapturePipeline::new(task_dir, manifest, self.settings.step_timeout);

        let (status, report, failure) = self
            .run_session(task, profile, &mut phases, &mut capture)
            .await?;

        phases.enter(OrchestratorPhase::terminal_for(status))?;
        let steps_executed = report.as_ref().map_or(0, |r| r.trace.len());
        let manifest = capture.finalize(status, failure)?;
        info!(
            status = status.as_str(),
            steps_executed,
            screenshots = manifest.screenshots_count,
            "task finished"
        );
        self.report(task_id, &manifest, steps_executed)
    }

    /// AUTHENTICATING through FINALIZING. Returns the terminal status, the
    /// execution report if execution started, and an error note.
    async fn run_session(
        &self,
        task: &str,
        profile: &AppProfile,
        phases: &mut PhaseTracker,
        capture: &mut CapturePipeline,
    ) -> Result<(TaskStatus, Option<ExecutionReport>, Option<String>)> {
        phases.enter(OrchestratorPhase::Authenticating)?;
        let deadline =
            Instant::now() + Duration::from_secs(profile.overall_timeout_seconds);
        let (publisher, slot) = plan_handoff();
        let planning = self.generator.spawn(
            PlanRequest {
                task: task.to_string(),
                app_id: profile.id.clone(),
                deadline,
            },
            publisher,
        );

        let login = self.login.authenticate(profile, deadline).await;
        let session = match login {
            Ok(session) => session,
            Err(failure) => {
                planning.abort();
                phases.enter(OrchestratorPhase::Finalizing)?;
                let status = match failure {
                    LoginFailure::DeadlineExceeded { .. } => TaskStatus::TimedOut,
                    _ => TaskStatus::Failed,
                };
                return Ok((status, None, Some(failure.to_string())));
            }
        };

        phases.enter(OrchestratorPhase::PlanReadyCheck)?;
        let ready = slot.take();
        // Whatever the generator produces from now on is discarded.
        planning.abort();
        if ready.is_none() {
            warn!("grounded plan not ready at login completion; falling back");
        }

        phases.enter(OrchestratorPhase::Executing)?;
        let report = self
            .engine
            .execute(ready, task, &session.app_id, capture, deadline)
            .await;

        phases.enter(OrchestratorPhase::Finalizing)?;
        let status = derive_status(report.stop);
        let failure = match report.stop {
            StopReason::Completed => None,
            StopReason::HardFailure { ordinal } => {
                let detail = report
                    .trace
                    .last()
                    .and_then(|entry| entry.detail.clone())
                    .unwrap_or_else(|| "agent reported an unrecoverable error".to_string());
                Some(format!("step {ordinal} failed: {detail}"))
            }
            StopReason::TimedOut => Some(format!(
                "task exceeded its {}s timeout",
                profile.overall_timeout_seconds
            )),
        };
        Ok((status, Some(report), failure))
    }

    fn report(&self, task_id: String, manifest: &Manifest, steps_executed: usize) -> Result<TaskResult> {
        let output_dir = self.settings.output_dir.join(&task_id);
        let result = TaskResult {
            task_id,
            task: manifest.task.clone(),
            status: manifest.status,
            app_id: manifest.app_id.clone(),
            plan_provenance: manifest.plan_provenance,
            steps_executed,
            screenshots: manifest.screenshots_count,
            manifest_path: output_dir.join(MANIFEST_FILE),
            output_dir,
            error: manifest.error.clone(),
        };
        let history_path = self.settings.output_dir.join(HISTORY_FILE);
        if let Err(err) = append_history(&history_path, &result) {
            warn!(error = %format!("{err:#}"), "could not append task history");
        }
        Ok(result)
    }
}
