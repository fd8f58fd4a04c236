//! Task-level lifecycle tests for the orchestrator.
//!
//! Each test drives `Orchestrator::run` end to end with scripted collaborators
//! under paused tokio time, then inspects the returned `TaskResult`, the
//! manifest on disk, and the calls the collaborators observed.
//!
//! Login for the built-in apps always waits the 15s second-factor window, so
//! "fast" and "slow" planning below are relative to that window.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use ui_capture::core::registry::AppRegistry;
use ui_capture::core::types::{PlanProvenance, StepOutcome, TaskResult, TaskStatus};
use ui_capture::exit_codes;
use ui_capture::io::history::{HISTORY_FILE, load_history};
use ui_capture::io::manifest::{Manifest, load_manifest};
use ui_capture::io::profile_store::ProfileStore;
use ui_capture::orchestrator::{Collaborators, Orchestrator, OrchestratorSettings};
use ui_capture::test_support::{
    AgentCall, MemoryProfileStore, ScriptedAgent, ScriptedSearch, ScriptedSummarizer, credentials,
    doc, steps,
};

const LINEAR_TASK: &str = "Create a project in Linear";

struct Harness {
    agent: Arc<ScriptedAgent>,
    search: Arc<ScriptedSearch>,
    summarizer: Arc<ScriptedSummarizer>,
    profiles: Arc<MemoryProfileStore>,
    step_timeout: Duration,
}

impl Harness {
    fn new(agent: ScriptedAgent, search: ScriptedSearch, summarizer: ScriptedSummarizer) -> Self {
        Self {
            agent: Arc::new(agent),
            search: Arc::new(search),
            summarizer: Arc::new(summarizer),
            profiles: Arc::new(MemoryProfileStore::default()),
            step_timeout: Duration::from_secs(60),
        }
    }

    fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    fn orchestrator(&self, output_dir: &Path) -> Orchestrator {
        Orchestrator::new(
            AppRegistry::builtin(),
            Collaborators {
                agent: self.agent.clone(),
                search: self.search.clone(),
                summarizer: self.summarizer.clone(),
                profiles: self.profiles.clone(),
            },
            credentials(),
            OrchestratorSettings {
                output_dir: output_dir.to_path_buf(),
                step_timeout: self.step_timeout,
                max_documents: 5,
            },
        )
    }
}

fn manifest_of(result: &TaskResult) -> Manifest {
    load_manifest(&result.manifest_path).expect("load manifest")
}

/// Linear, 3 grounded steps, all succeed: SUCCESS with screenshots 1..=3.
#[tokio::test(start_paused = true)]
async fn three_step_task_succeeds_with_contiguous_screenshots() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new(),
        ScriptedSearch::ready(vec![doc("projects"), doc("teams")]),
        ScriptedSummarizer::ready(steps(3)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    assert_eq!(result.status, TaskStatus::Success);
    assert_eq!(exit_codes::for_status(result.status), exit_codes::OK);
    assert_eq!(result.app_id.as_deref(), Some("linear"));
    assert_eq!(result.steps_executed, 3);
    assert_eq!(result.screenshots, 3);
    assert_eq!(result.error, None);

    let manifest = manifest_of(&result);
    assert_eq!(manifest.status, TaskStatus::Success);
    assert_eq!(manifest.app_name.as_deref(), Some("Linear"));
    assert_eq!(
        manifest.plan_provenance,
        Some(PlanProvenance::DocumentationGrounded)
    );
    let sequences: Vec<u32> = manifest.screenshots.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    for shot in &manifest.screenshots {
        let file = shot.file.as_ref().expect("image file");
        assert!(result.output_dir.join(file).is_file());
    }
    assert!(harness.profiles.exists("linear").expect("exists"));
    assert_eq!(
        harness.summarizer.grounded_document_counts(),
        vec![Some(2)]
    );
}

/// Planning finishes well inside the second-factor window, so the grounded
/// plan is the one executed.
#[tokio::test(start_paused = true)]
async fn grounded_plan_ready_before_login_is_used() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_navigate_delay(Duration::from_secs(5)),
        ScriptedSearch::ready(vec![doc("projects")]).with_delay(Duration::from_secs(10)),
        ScriptedSummarizer::split(Ok(steps(2)), Ok(steps(4))),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    assert_eq!(
        result.plan_provenance,
        Some(PlanProvenance::DocumentationGrounded)
    );
    assert_eq!(harness.agent.dispatched_ordinals(), vec![1, 2]);
    assert_eq!(harness.summarizer.grounded_document_counts(), vec![Some(1)]);
}

/// A search that never resolves does not delay execution: the fallback plan
/// starts right after login.
#[tokio::test(start_paused = true)]
async fn never_resolving_search_falls_back_without_waiting() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_step_delay(Duration::from_secs(2)),
        ScriptedSearch::never(),
        ScriptedSummarizer::split(Err("unused".to_string()), Ok(steps(2)))
            .with_fallback_delay(Duration::from_secs(5)),
    );

    let started = Instant::now();
    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");
    let elapsed = started.elapsed();

    assert_eq!(result.status, TaskStatus::Success);
    assert_eq!(
        result.plan_provenance,
        Some(PlanProvenance::OnDemandFallback)
    );
    // 15s second-factor window + 5s fallback summary + 2 steps at 2s each.
    assert!(elapsed >= Duration::from_secs(24), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(25), "elapsed {elapsed:?}");
    assert_eq!(harness.summarizer.grounded_document_counts(), vec![None]);
    assert_eq!(
        harness.search.queries(),
        vec!["linear how to Create a project in Linear".to_string()]
    );
}

/// Planning that finishes after login is discarded; exactly one plan drives
/// execution and the grounded summary is never requested.
#[tokio::test(start_paused = true)]
async fn late_grounded_plan_is_discarded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new(),
        ScriptedSearch::ready(vec![doc("projects")]).with_delay(Duration::from_secs(20)),
        ScriptedSummarizer::split(Ok(steps(5)), Ok(steps(1))),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    // Let the aborted generator's timers lapse.
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(
        result.plan_provenance,
        Some(PlanProvenance::OnDemandFallback)
    );
    assert_eq!(harness.agent.dispatched_ordinals(), vec![1]);
    assert_eq!(harness.summarizer.grounded_document_counts(), vec![None]);
}

/// A hard failure at step 2 of 4 yields PARTIAL with exactly two entries.
#[tokio::test(start_paused = true)]
async fn hard_failure_mid_plan_is_partial() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_outcomes(vec![StepOutcome::Success, StepOutcome::HardFailure]),
        ScriptedSearch::ready(vec![doc("projects")]),
        ScriptedSummarizer::ready(steps(4)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    assert_eq!(result.status, TaskStatus::Partial);
    assert_eq!(exit_codes::for_status(result.status), exit_codes::PARTIAL);
    assert_eq!(harness.agent.dispatched_ordinals(), vec![1, 2]);

    let manifest = manifest_of(&result);
    assert_eq!(manifest.status, TaskStatus::Partial);
    assert_eq!(manifest.screenshots_count, 2);
    assert_eq!(manifest.screenshots[1].outcome, StepOutcome::HardFailure);
    assert!(
        manifest
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("step 2 failed")
    );
}

/// Soft failures are recorded but do not change a completed run's status.
#[tokio::test(start_paused = true)]
async fn soft_failures_still_complete() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_outcomes(vec![StepOutcome::SoftFailure]),
        ScriptedSearch::ready(vec![doc("projects")]),
        ScriptedSummarizer::ready(steps(2)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    assert_eq!(result.status, TaskStatus::Success);
    let manifest = manifest_of(&result);
    assert_eq!(manifest.screenshots[0].outcome, StepOutcome::SoftFailure);
    assert_eq!(manifest.screenshots_count, 2);
}

/// The 180s budget runs out during execution: TIMED_OUT with the screenshots
/// captured so far.
#[tokio::test(start_paused = true)]
async fn global_timeout_during_execution_keeps_captured_screenshots() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_step_delay(Duration::from_secs(60)),
        ScriptedSearch::ready(vec![doc("projects")]),
        ScriptedSummarizer::ready(steps(5)),
    )
    .with_step_timeout(Duration::from_secs(120));

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    // Steps start at t=15, 75 and 135; the fourth would start at t=195.
    assert_eq!(result.status, TaskStatus::TimedOut);
    assert_eq!(exit_codes::for_status(result.status), exit_codes::TIMED_OUT);
    assert_eq!(harness.agent.dispatched_ordinals(), vec![1, 2, 3]);

    let manifest = manifest_of(&result);
    assert_eq!(manifest.status, TaskStatus::TimedOut);
    assert_eq!(manifest.screenshots_count, 3);
}

#[tokio::test(start_paused = true)]
async fn unknown_app_fails_before_login() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new(),
        ScriptedSearch::ready(vec![doc("boards")]),
        ScriptedSummarizer::ready(steps(1)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run("Create a board in Trello")
        .await
        .expect("run");

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.app_id, None);
    assert!(harness.agent.calls().is_empty());
    assert!(harness.search.queries().is_empty());

    let manifest = manifest_of(&result);
    assert_eq!(manifest.status, TaskStatus::Failed);
    assert_eq!(manifest.screenshots_count, 0);
    let error = manifest.error.unwrap_or_default();
    assert!(error.contains("asana, github, jira, linear, monday, notion"), "{error}");
}

#[tokio::test(start_paused = true)]
async fn login_failure_skips_execution() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_session_active(false),
        ScriptedSearch::ready(vec![doc("projects")]),
        ScriptedSummarizer::ready(steps(3)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.steps_executed, 0);
    assert!(harness.agent.dispatched_ordinals().is_empty());
    assert!(
        !harness
            .agent
            .calls()
            .iter()
            .any(|call| matches!(call, AgentCall::Snapshot))
    );

    let manifest = manifest_of(&result);
    assert_eq!(manifest.status, TaskStatus::Failed);
    assert_eq!(manifest.plan_provenance, None);
    assert!(!harness.profiles.exists("linear").expect("exists"));
}

#[tokio::test(start_paused = true)]
async fn deadline_during_login_is_timed_out() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new().with_navigate_delay(Duration::from_secs(200)),
        ScriptedSearch::ready(vec![doc("projects")]),
        ScriptedSummarizer::ready(steps(3)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run(LINEAR_TASK)
        .await
        .expect("run");

    assert_eq!(result.status, TaskStatus::TimedOut);
    assert!(harness.agent.dispatched_ordinals().is_empty());
    assert_eq!(manifest_of(&result).screenshots_count, 0);
}

#[tokio::test(start_paused = true)]
async fn every_run_is_appended_to_history() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new(),
        ScriptedSearch::ready(vec![doc("pages")]),
        ScriptedSummarizer::ready(steps(1)),
    );

    let result = harness
        .orchestrator(temp.path())
        .run("Create a database in Notion")
        .await
        .expect("run");

    let history = load_history(&temp.path().join(HISTORY_FILE)).expect("history");
    assert_eq!(history, vec![result]);
}

/// Two tasks started within the same second get separate task directories,
/// so the first task's manifest is left intact.
#[tokio::test(start_paused = true)]
async fn back_to_back_runs_keep_separate_outputs() {
    let temp = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        ScriptedAgent::new(),
        ScriptedSearch::ready(vec![doc("boards")]),
        ScriptedSummarizer::ready(steps(1)),
    );
    let orchestrator = harness.orchestrator(temp.path());

    let first = orchestrator
        .run("Create a board in Trello")
        .await
        .expect("first run");
    let second = orchestrator
        .run("Order pizza somewhere")
        .await
        .expect("second run");

    assert_ne!(first.task_id, second.task_id);
    assert_ne!(first.manifest_path, second.manifest_path);
    assert_eq!(manifest_of(&first).task, "Create a board in Trello");
    assert_eq!(manifest_of(&second).task, "Order pizza somewhere");

    let history = load_history(&temp.path().join(HISTORY_FILE)).expect("history");
    assert_eq!(history, vec![first, second]);
}
