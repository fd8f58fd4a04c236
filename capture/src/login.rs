//! Blocking, human-in-the-loop login for one app profile.
//!
//! The second factor is entered by a human out of band; nothing signals its
//! completion back into the process. The controller therefore sleeps for the
//! whole wait window and checks for session indicators exactly once afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::login_state::LoginState;
use crate::core::registry::AppProfile;
use crate::io::agent::{Credentials, UiAgent};
use crate::io::profile_store::ProfileStore;

/// Fatal login outcomes. Retrying a second factor is a human decision, so none
/// of these are retried automatically.
#[derive(Debug, Error)]
pub enum LoginFailure {
    #[error("could not open {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("could not submit credentials: {0}")]
    Credentials(String),
    #[error("no signed-in session for {app_id} after the {wait_secs}s second-factor window")]
    NotAuthenticated { app_id: String, wait_secs: u64 },
    #[error("could not check session state: {0}")]
    Check(String),
    #[error("task deadline passed during login (last state {last_state:?})")]
    DeadlineExceeded { last_state: LoginState },
    #[error("illegal login transition {from:?} -> {to:?}")]
    IllegalTransition { from: LoginState, to: LoginState },
}

/// Per-task login session. Discarded at the end of the task; only the browser
/// profile behind `profile_location` persists.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub app_id: String,
    pub state: LoginState,
    pub started_at: DateTime<Utc>,
    pub profile_location: PathBuf,
    /// Whether the persisted-profile fast path skipped credential entry.
    pub reused_profile: bool,
}

impl LoginSession {
    fn new(profile: &AppProfile, profile_location: PathBuf) -> Self {
        Self {
            app_id: profile.id.clone(),
            state: LoginState::NotStarted,
            started_at: Utc::now(),
            profile_location,
            reused_profile: false,
        }
    }

    fn advance(&mut self, next: LoginState) -> Result<(), LoginFailure> {
        if !self.state.can_transition_to(next) {
            return Err(LoginFailure::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "login transition");
        self.state = next;
        Ok(())
    }
}

/// Drives the login state machine with the agent's act/observe primitives.
#[derive(Clone)]
pub struct LoginController {
    agent: Arc<dyn UiAgent>,
    store: Arc<dyn ProfileStore>,
    credentials: Credentials,
}

impl LoginController {
    pub fn new(
        agent: Arc<dyn UiAgent>,
        store: Arc<dyn ProfileStore>,
        credentials: Credentials,
    ) -> Self {
        Self {
            agent,
            store,
            credentials,
        }
    }

    /// Authenticate against `profile`, bounded by `deadline`.
    #[instrument(skip_all, fields(app_id = %profile.id))]
    pub async fn authenticate(
        &self,
        profile: &AppProfile,
        deadline: Instant,
    ) -> Result<LoginSession, LoginFailure> {
        let mut session = LoginSession::new(profile, self.store.location(&profile.id));
        let result = tokio::time::timeout_at(deadline, self.run(profile, &mut session)).await;
        match result {
            Ok(Ok(())) => Ok(session),
            Ok(Err(failure)) => {
                // Best effort: the session is discarded anyway.
                let _ = session.advance(LoginState::Failed);
                warn!(error = %failure, "login failed");
                Err(failure)
            }
            Err(_) => {
                warn!(last_state = ?session.state, "login hit the task deadline");
                Err(LoginFailure::DeadlineExceeded {
                    last_state: session.state,
                })
            }
        }
    }

    async fn run(&self, profile: &AppProfile, session: &mut LoginSession) -> Result<(), LoginFailure> {
        self.agent
            .navigate(&profile.login_url)
            .await
            .map_err(|err| LoginFailure::Navigation {
                url: profile.login_url.clone(),
                reason: format!("{err:#}"),
            })?;
        session.advance(LoginState::Navigated)?;

        // A store read error is not fatal; it just disables the fast path.
        let persisted = match self.store.exists(&profile.id) {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "profile store unreadable; entering credentials");
                false
            }
        };
        if persisted {
            info!("persisted profile found; skipping credential entry");
            session.reused_profile = true;
        } else {
            self.agent
                .submit_credentials(profile, &self.credentials)
                .await
                .map_err(|err| LoginFailure::Credentials(format!("{err:#}")))?;
            session.advance(LoginState::CredentialsSubmitted)?;
        }

        session.advance(LoginState::AwaitingSecondFactor)?;
        info!(
            wait_secs = profile.mfa_wait_seconds,
            "waiting for out-of-band second factor"
        );
        tokio::time::sleep(Duration::from_secs(profile.mfa_wait_seconds)).await;

        let active = self
            .agent
            .session_active(profile)
            .await
            .map_err(|err| LoginFailure::Check(format!("{err:#}")))?;
        if !active {
            return Err(LoginFailure::NotAuthenticated {
                app_id: profile.id.clone(),
                wait_secs: profile.mfa_wait_seconds,
            });
        }
        session.advance(LoginState::Authenticated)?;

        if let Err(err) = self.store.mark_authenticated(&profile.id) {
            warn!(error = %format!("{err:#}"), "could not persist authenticated profile");
        }
        info!(reused_profile = session.reused_profile, "authenticated");
        Ok(())
    }
}
