//! UI-driving agent boundary.
//!
//! The [`UiAgent`] trait decouples orchestration from the agent backend that
//! actually moves the pointer and keyboard. Tests use scripted agents; the CLI
//! uses [`CommandAgent`], which talks to an external bridge process.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::registry::{AppProfile, LoginSelectors};
use crate::core::types::{Step, StepOutcome};
use crate::io::process::call_json;

/// Login credentials supplied by the operator.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the agent reports for one dispatched step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub outcome: StepOutcome,
    /// PNG bytes of the UI state right after the step, if the agent took one.
    pub snapshot: Option<Vec<u8>>,
    pub detail: Option<String>,
}

/// Act/observe primitives of the UI-driving agent.
///
/// An `Err` from [`UiAgent::dispatch`] means the agent itself broke (crashed
/// page, detached frame, dead bridge) and is treated as a hard failure.
#[async_trait]
pub trait UiAgent: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn submit_credentials(&self, profile: &AppProfile, credentials: &Credentials)
    -> Result<()>;
    /// Whether logged-in indicators are visible for the app.
    async fn session_active(&self, profile: &AppProfile) -> Result<bool>;
    async fn dispatch(&self, step: &Step) -> Result<AgentReport>;
    /// Best-effort PNG of whatever is currently on screen.
    async fn snapshot(&self) -> Result<Vec<u8>>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum AgentRequest<'a> {
    Navigate {
        url: &'a str,
    },
    SubmitCredentials {
        app_id: &'a str,
        selectors: &'a LoginSelectors,
        email: &'a str,
        password: &'a str,
    },
    SessionActive {
        app_id: &'a str,
        base_url: &'a str,
    },
    Dispatch {
        step: &'a Step,
    },
    Snapshot,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    outcome: Option<StepOutcome>,
    #[serde(default)]
    snapshot_b64: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

fn default_ok() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    profile_dir: &'a PathBuf,
    #[serde(flatten)]
    request: AgentRequest<'a>,
}

/// Agent backed by an external bridge command.
///
/// Each call spawns the command once, writes a JSON request with an `action`
/// tag and the persistent `profile_dir` to stdin, and reads one JSON response
/// from stdout. The bridge is expected to attach to a long-lived browser that
/// uses `profile_dir` as its user data directory.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: Vec<String>,
    profile_dir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandAgent {
    pub fn new(
        command: Vec<String>,
        profile_dir: PathBuf,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            command,
            profile_dir,
            timeout,
            output_limit_bytes,
        }
    }

    async fn call(&self, request: AgentRequest<'_>) -> Result<AgentResponse> {
        let payload = serde_json::to_value(Envelope {
            profile_dir: &self.profile_dir,
            request,
        })
        .context("serialize agent request")?;
        let command = self.command.clone();
        let timeout = self.timeout;
        let limit = self.output_limit_bytes;
        let response: AgentResponse = tokio::task::spawn_blocking(move || {
            call_json(&command, &payload, timeout, limit)
        })
        .await
        .context("join agent call")??;
        if !response.ok {
            return Err(anyhow!(
                "agent error: {}",
                response.error.as_deref().unwrap_or("unspecified")
            ));
        }
        Ok(response)
    }
}

fn decode_snapshot(raw: Option<&str>) -> Result<Option<Vec<u8>>> {
    raw.map(|b64| BASE64.decode(b64).context("decode snapshot base64"))
        .transpose()
}

#[async_trait]
impl UiAgent for CommandAgent {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        self.call(AgentRequest::Navigate { url }).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(app_id = %profile.id))]
    async fn submit_credentials(
        &self,
        profile: &AppProfile,
        credentials: &Credentials,
    ) -> Result<()> {
        self.call(AgentRequest::SubmitCredentials {
            app_id: &profile.id,
            selectors: &profile.selectors,
            email: &credentials.email,
            password: &credentials.password,
        })
        .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(app_id = %profile.id))]
    async fn session_active(&self, profile: &AppProfile) -> Result<bool> {
        let response = self
            .call(AgentRequest::SessionActive {
                app_id: &profile.id,
                base_url: &profile.base_url,
            })
            .await?;
        response
            .active
            .ok_or_else(|| anyhow!("agent response missing `active`"))
    }

    #[instrument(skip_all, fields(ordinal = step.ordinal))]
    async fn dispatch(&self, step: &Step) -> Result<AgentReport> {
        let response = self.call(AgentRequest::Dispatch { step }).await?;
        let outcome = response
            .outcome
            .ok_or_else(|| anyhow!("agent response missing `outcome`"))?;
        let snapshot = decode_snapshot(response.snapshot_b64.as_deref())?;
        debug!(?outcome, has_snapshot = snapshot.is_some(), "step dispatched");
        Ok(AgentReport {
            outcome,
            snapshot,
            detail: response.detail,
        })
    }

    async fn snapshot(&self) -> Result<Vec<u8>> {
        let response = self.call(AgentRequest::Snapshot).await?;
        decode_snapshot(response.snapshot_b64.as_deref())?
            .ok_or_else(|| anyhow!("agent response missing `snapshot_b64`"))
    }
}
