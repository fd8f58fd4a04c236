//! Static application profiles and task-to-app detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default second-factor wait window in seconds.
pub const DEFAULT_MFA_WAIT_SECS: u64 = 15;
/// Default global task timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
/// Global task timeout for profiles flagged `complex`.
pub const COMPLEX_TIMEOUT_SECS: u64 = 300;

/// Opaque selectors the UI agent uses on the login page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSelectors {
    pub email: String,
    pub password: String,
    pub submit: String,
}

/// Per-application configuration. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppProfile {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub login_url: String,
    pub selectors: LoginSelectors,
    #[serde(default = "default_mfa_wait")]
    pub mfa_wait_seconds: u64,
    #[serde(default = "default_timeout")]
    pub overall_timeout_seconds: u64,
    /// Complex apps get the longer global timeout.
    #[serde(default)]
    pub complex: bool,
}

fn default_mfa_wait() -> u64 {
    DEFAULT_MFA_WAIT_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Lookup table from app id to profile.
///
/// Ids are stored lowercase; iteration order is sorted by id so detection is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
    profiles: BTreeMap<String, AppProfile>,
}

impl AppRegistry {
    /// Registry with the built-in application table.
    pub fn builtin() -> Self {
        Self::from_profiles(builtin_profiles())
    }

    /// Built-in table with `overrides` replacing (by id) or extending it.
    pub fn with_overrides(overrides: impl IntoIterator<Item = AppProfile>) -> Self {
        let mut registry = Self::builtin();
        for profile in overrides {
            registry.insert(profile);
        }
        registry
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = AppProfile>) -> Self {
        let mut registry = Self::default();
        for profile in profiles {
            registry.insert(profile);
        }
        registry
    }

    fn insert(&mut self, mut profile: AppProfile) {
        profile.id = profile.id.to_lowercase();
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn get(&self, id: &str) -> Option<&AppProfile> {
        self.profiles.get(&id.to_lowercase())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &AppProfile> {
        self.profiles.values()
    }

    /// Return the first profile (by sorted id) whose id occurs in the task text.
    pub fn detect(&self, task_text: &str) -> Option<&AppProfile> {
        let lowered = task_text.to_lowercase();
        self.profiles
            .values()
            .find(|profile| lowered.contains(profile.id.as_str()))
    }
}

fn profile(
    id: &str,
    name: &str,
    base_url: &str,
    login_url: &str,
    selectors: (&str, &str, &str),
) -> AppProfile {
    AppProfile {
        id: id.to_string(),
        name: name.to_string(),
        base_url: base_url.to_string(),
        login_url: login_url.to_string(),
        selectors: LoginSelectors {
            email: selectors.0.to_string(),
            password: selectors.1.to_string(),
            submit: selectors.2.to_string(),
        },
        mfa_wait_seconds: DEFAULT_MFA_WAIT_SECS,
        overall_timeout_seconds: DEFAULT_TIMEOUT_SECS,
        complex: false,
    }
}

fn builtin_profiles() -> Vec<AppProfile> {
    const FORM: (&str, &str, &str) = (
        "input[type='email']",
        "input[type='password']",
        "button[type='submit']",
    );
    let mut monday = profile(
        "monday",
        "monday.com",
        "https://monday.com",
        "https://auth.monday.com/login",
        FORM,
    );
    monday.complex = true;
    monday.overall_timeout_seconds = COMPLEX_TIMEOUT_SECS;

    vec![
        profile(
            "notion",
            "Notion",
            "https://www.notion.so",
            "https://www.notion.so/login",
            FORM,
        ),
        profile(
            "linear",
            "Linear",
            "https://linear.app",
            "https://linear.app/login",
            FORM,
        ),
        profile(
            "asana",
            "Asana",
            "https://app.asana.com",
            "https://app.asana.com/-/login",
            FORM,
        ),
        profile(
            "github",
            "GitHub",
            "https://github.com",
            "https://github.com/login",
            (
                "input[name='login']",
                "input[name='password']",
                "input[type='submit']",
            ),
        ),
        profile(
            "jira",
            "Jira",
            "https://www.atlassian.com/software/jira",
            "https://id.atlassian.com/login",
            (
                "input[name='email']",
                "input[name='password']",
                "button[type='submit']",
            ),
        ),
        monday,
    ]
}
