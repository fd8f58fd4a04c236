//! Persisted authentication profiles keyed by app id.
//!
//! The browser profile itself (cookies, local storage) lives in the directory
//! returned by [`ProfileStore::location`]; the store only records whether a
//! login has ever succeeded there. Entries are overwritten on every successful
//! login and never invalidated by this crate.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MARKER_FILE: &str = "authenticated.json";

/// Process-external, restart-surviving record of authenticated profiles.
pub trait ProfileStore: Send + Sync {
    fn exists(&self, app_id: &str) -> Result<bool>;
    fn mark_authenticated(&self, app_id: &str) -> Result<()>;
    /// Opaque reference handed to the UI agent and recorded in the manifest.
    fn location(&self, app_id: &str) -> PathBuf;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileMarker {
    pub app_id: String,
    pub authenticated_at: DateTime<Utc>,
}

/// Filesystem store: `<root>/<app_id>/authenticated.json`.
#[derive(Debug, Clone)]
pub struct FsProfileStore {
    root: PathBuf,
}

impl FsProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn marker_path(&self, app_id: &str) -> PathBuf {
        self.location(app_id).join(MARKER_FILE)
    }
}

impl ProfileStore for FsProfileStore {
    fn exists(&self, app_id: &str) -> Result<bool> {
        let path = self.marker_path(app_id);
        if !path.exists() {
            return Ok(false);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let marker: ProfileMarker = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", path.display()))?;
        debug!(app_id, authenticated_at = %marker.authenticated_at, "found persisted profile");
        Ok(marker.app_id == app_id)
    }

    fn mark_authenticated(&self, app_id: &str) -> Result<()> {
        let marker = ProfileMarker {
            app_id: app_id.to_string(),
            authenticated_at: Utc::now(),
        };
        let mut buf = serde_json::to_string_pretty(&marker)?;
        buf.push('\n');
        write_atomic(&self.marker_path(app_id), &buf)
    }

    fn location(&self, app_id: &str) -> PathBuf {
        self.root.join(app_id)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("profile marker missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp marker {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace marker {}", path.display()))?;
    Ok(())
}
