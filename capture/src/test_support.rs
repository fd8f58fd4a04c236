//! Test-only scripted collaborators and fixtures.

use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::core::registry::AppProfile;
use crate::core::types::{Document, Plan, PlanProvenance, Step, StepOutcome};
use crate::io::agent::{AgentReport, Credentials, UiAgent};
use crate::io::planner::PlanSummarizer;
use crate::io::profile_store::ProfileStore;
use crate::io::search::SearchService;

/// Smallest valid-looking PNG payload used by scripted snapshots.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nscripted";

pub fn credentials() -> Credentials {
    Credentials {
        email: "ops@example.com".to_string(),
        password: "not-a-real-password".to_string(),
    }
}

pub fn doc(title: &str) -> Document {
    Document {
        title: title.to_string(),
        url: format!("https://docs.example.com/{title}"),
        snippet: format!("{title} snippet"),
    }
}

/// `n` steps with ordinals `1..=n`.
pub fn steps(n: u32) -> Vec<Step> {
    (1..=n).map(|i| Step::new(i, format!("step {i}"))).collect()
}

pub fn grounded_plan(n: u32) -> Plan {
    Plan {
        steps: steps(n),
        provenance: PlanProvenance::DocumentationGrounded,
    }
}

/// Calls observed by [`ScriptedAgent`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Navigate(String),
    SubmitCredentials(String),
    SessionActive(String),
    Dispatch(u32),
    Snapshot,
}

/// Agent whose behavior is fixed up front.
///
/// Dispatch outcomes are consumed from a queue; once it is empty every step
/// succeeds. Every successful dispatch returns [`FAKE_PNG`] as its snapshot.
pub struct ScriptedAgent {
    session_active: bool,
    navigation_error: Option<String>,
    navigate_delay: Duration,
    step_delay: Duration,
    outcomes: Mutex<VecDeque<StepOutcome>>,
    dispatch_error_at: Option<(u32, String)>,
    snapshot_error: Option<String>,
    calls: Mutex<Vec<AgentCall>>,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            session_active: true,
            navigation_error: None,
            navigate_delay: Duration::ZERO,
            step_delay: Duration::ZERO,
            outcomes: Mutex::new(VecDeque::new()),
            dispatch_error_at: None,
            snapshot_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_session_active(mut self, active: bool) -> Self {
        self.session_active = active;
        self
    }

    pub fn with_navigation_error(mut self, message: &str) -> Self {
        self.navigation_error = Some(message.to_string());
        self
    }

    /// Slow down the login page load (and therefore the whole login path).
    pub fn with_navigate_delay(mut self, delay: Duration) -> Self {
        self.navigate_delay = delay;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_outcomes(self, outcomes: Vec<StepOutcome>) -> Self {
        *lock(&self.outcomes) = outcomes.into();
        self
    }

    pub fn with_dispatch_error_at(mut self, ordinal: u32, message: &str) -> Self {
        self.dispatch_error_at = Some((ordinal, message.to_string()));
        self
    }

    pub fn with_snapshot_error(mut self, message: &str) -> Self {
        self.snapshot_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        lock(&self.calls).clone()
    }

    pub fn dispatched_ordinals(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                AgentCall::Dispatch(ordinal) => Some(ordinal),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: AgentCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl UiAgent for ScriptedAgent {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(AgentCall::Navigate(url.to_string()));
        tokio::time::sleep(self.navigate_delay).await;
        match &self.navigation_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    async fn submit_credentials(
        &self,
        profile: &AppProfile,
        _credentials: &Credentials,
    ) -> Result<()> {
        self.record(AgentCall::SubmitCredentials(profile.id.clone()));
        Ok(())
    }

    async fn session_active(&self, profile: &AppProfile) -> Result<bool> {
        self.record(AgentCall::SessionActive(profile.id.clone()));
        Ok(self.session_active)
    }

    async fn dispatch(&self, step: &Step) -> Result<AgentReport> {
        self.record(AgentCall::Dispatch(step.ordinal));
        tokio::time::sleep(self.step_delay).await;
        if let Some((ordinal, message)) = &self.dispatch_error_at
            && *ordinal == step.ordinal
        {
            return Err(anyhow!("{message}"));
        }
        let outcome = lock(&self.outcomes)
            .pop_front()
            .unwrap_or(StepOutcome::Success);
        Ok(AgentReport {
            outcome,
            snapshot: Some(FAKE_PNG.to_vec()),
            detail: None,
        })
    }

    async fn snapshot(&self) -> Result<Vec<u8>> {
        self.record(AgentCall::Snapshot);
        match &self.snapshot_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(FAKE_PNG.to_vec()),
        }
    }
}

/// In-memory profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    authenticated: Mutex<BTreeSet<String>>,
}

impl MemoryProfileStore {
    pub fn with(app_ids: &[&str]) -> Self {
        Self {
            authenticated: Mutex::new(app_ids.iter().map(|id| id.to_string()).collect()),
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn exists(&self, app_id: &str) -> Result<bool> {
        Ok(lock(&self.authenticated).contains(app_id))
    }

    fn mark_authenticated(&self, app_id: &str) -> Result<()> {
        lock(&self.authenticated).insert(app_id.to_string());
        Ok(())
    }

    fn location(&self, app_id: &str) -> PathBuf {
        PathBuf::from("memory-profiles").join(app_id)
    }
}

enum SearchScript {
    Ready(Vec<Document>),
    Failing(String),
    Never,
}

/// Search service returning a fixed result after an optional delay.
pub struct ScriptedSearch {
    script: SearchScript,
    delay: Duration,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    fn scripted(script: SearchScript) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn ready(documents: Vec<Document>) -> Self {
        Self::scripted(SearchScript::Ready(documents))
    }

    pub fn failing(message: &str) -> Self {
        Self::scripted(SearchScript::Failing(message.to_string()))
    }

    /// A search that never resolves.
    pub fn never() -> Self {
        Self::scripted(SearchScript::Never)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl SearchService for ScriptedSearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        lock(&self.queries).push(query.to_string());
        tokio::time::sleep(self.delay).await;
        match &self.script {
            SearchScript::Ready(documents) => Ok(documents.clone()),
            SearchScript::Failing(message) => Err(anyhow!("{message}")),
            SearchScript::Never => std::future::pending().await,
        }
    }
}

/// Summarizer with separate grounded and fallback answers.
pub struct ScriptedSummarizer {
    grounded: Result<Vec<Step>, String>,
    fallback: Result<Vec<Step>, String>,
    fallback_delay: Duration,
    calls: Mutex<Vec<Option<usize>>>,
}

impl ScriptedSummarizer {
    /// Same steps for grounded and fallback requests.
    pub fn ready(steps: Vec<Step>) -> Self {
        Self::split(Ok(steps.clone()), Ok(steps))
    }

    pub fn failing(message: &str) -> Self {
        Self::split(Err(message.to_string()), Err(message.to_string()))
    }

    pub fn split(grounded: Result<Vec<Step>, String>, fallback: Result<Vec<Step>, String>) -> Self {
        Self {
            grounded,
            fallback,
            fallback_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Document count per call; `None` marks an ungrounded (fallback) call.
    pub fn grounded_document_counts(&self) -> Vec<Option<usize>> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl PlanSummarizer for ScriptedSummarizer {
    async fn summarize(
        &self,
        _task: &str,
        _app_id: &str,
        documents: Option<&[Document]>,
    ) -> Result<Vec<Step>> {
        lock(&self.calls).push(documents.map(<[Document]>::len));
        let answer = match documents {
            Some(_) => &self.grounded,
            None => {
                tokio::time::sleep(self.fallback_delay).await;
                &self.fallback
            }
        };
        answer.clone().map_err(|message| anyhow!("{message}"))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
