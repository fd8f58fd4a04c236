//! Capture configuration stored in `ui-capture.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::registry::{AppProfile, AppRegistry};

/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ui-capture.toml";

/// Capture configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that
/// match the built-in app table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Base directory for per-task output directories and `history.jsonl`.
    pub output_dir: PathBuf,

    /// Persisted authentication profiles, one directory per app id.
    pub profile_dir: PathBuf,

    /// Upper bound for a single UI-agent dispatch in seconds.
    pub step_timeout_secs: u64,

    /// Upper bound for one search or summarizer call in seconds.
    pub collaborator_timeout_secs: u64,

    /// Number of top-ranked search documents passed to the summarizer.
    pub max_documents: usize,

    /// Collaborator responses larger than this are rejected.
    pub output_limit_bytes: usize,

    pub agent: CommandConfig,
    pub search: CommandConfig,
    pub planner: CommandConfig,

    /// Extra or replacement app profiles, keyed by `id`.
    pub apps: Vec<AppProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Command line for the collaborator (e.g. `["python3","agent_bridge.py"]`).
    pub command: Vec<String>,
}

impl CommandConfig {
    fn named(script: &str) -> Self {
        Self {
            command: vec!["python3".to_string(), script.to_string()],
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self::named("agent_bridge.py")
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            profile_dir: PathBuf::from(".ui-capture/profiles"),
            step_timeout_secs: 60,
            collaborator_timeout_secs: 60,
            max_documents: 5,
            output_limit_bytes: 20_000_000,
            agent: CommandConfig::named("agent_bridge.py"),
            search: CommandConfig::named("search_bridge.py"),
            planner: CommandConfig::named("planner_bridge.py"),
            apps: Vec::new(),
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.step_timeout_secs == 0 {
            return Err(anyhow!("step_timeout_secs must be > 0"));
        }
        if self.collaborator_timeout_secs == 0 {
            return Err(anyhow!("collaborator_timeout_secs must be > 0"));
        }
        if self.max_documents == 0 {
            return Err(anyhow!("max_documents must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (name, cfg) in [
            ("agent", &self.agent),
            ("search", &self.search),
            ("planner", &self.planner),
        ] {
            if cfg.command.is_empty() || cfg.command[0].trim().is_empty() {
                return Err(anyhow!("{name}.command must be a non-empty array"));
            }
        }
        for app in &self.apps {
            if app.id.trim().is_empty() {
                return Err(anyhow!("apps entries need a non-empty id"));
            }
            if app.overall_timeout_seconds == 0 {
                return Err(anyhow!(
                    "apps.{}: overall_timeout_seconds must be > 0",
                    app.id
                ));
            }
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    /// Built-in app table merged with `[[apps]]` overrides.
    pub fn registry(&self) -> AppRegistry {
        AppRegistry::with_overrides(self.apps.iter().cloned())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CaptureConfig::default()`.
pub fn load_config(path: &Path) -> Result<CaptureConfig> {
    if !path.exists() {
        let cfg = CaptureConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CaptureConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
