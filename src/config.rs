use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

pub const STORAGE_DIR_NAME: &str = ".activity-dashboard";
const CONFIG_FILE: &str = "config.json";

const USERNAME_ENV: &str = "ACTIVITY_DASHBOARD_USER";
const TOKEN_ENV: &str = "GITHUB_TOKEN";

const DEFAULT_USERNAME: &str = "octocat";
const DEFAULT_CONTRIBUTION_GOAL: u64 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub username: String,
    /// Optional; unauthenticated requests work but hit a lower rate limit.
    pub token: Option<String>,
    /// Yearly contribution target the totals ring fills towards.
    pub contribution_goal: u64,
    pub profile_url: String,
    pub calendar_url: String,
    pub events_url: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_owned(),
            token: None,
            contribution_goal: DEFAULT_CONTRIBUTION_GOAL,
            profile_url: "https://api.github.com/users".to_owned(),
            calendar_url: "https://github-contributions-api.jogruber.de/v4".to_owned(),
            events_url: "https://api.github.com/users".to_owned(),
        }
    }
}

impl DashboardConfig {
    /// Reads `~/.activity-dashboard/config.json` if present, then applies
    /// environment overrides. An unreadable file falls back to defaults
    /// without losing the overrides.
    pub fn load() -> Self {
        let path = match storage_dir() {
            Ok(dir) => Some(dir.join(CONFIG_FILE)),
            Err(err) => {
                tracing::warn!(error = %err, "no home directory; using default configuration");
                None
            }
        };
        Self::resolve(
            path.as_deref(),
            env::var(USERNAME_ENV).ok(),
            env::var(TOKEN_ENV).ok(),
        )
    }

    fn resolve(path: Option<&Path>, username: Option<String>, token: Option<String>) -> Self {
        let mut config = match path.map(Self::from_file) {
            Some(Ok(config)) => config,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "ignoring configuration file; using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(username, token);
        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "falling back to the default username");
            config.username = DEFAULT_USERNAME.to_owned();
        }
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn apply_overrides(&mut self, username: Option<String>, token: Option<String>) {
        if let Some(username) = username.filter(|value| !value.trim().is_empty()) {
            self.username = username.trim().to_owned();
        }
        if let Some(token) = token.filter(|value| !value.trim().is_empty()) {
            self.token = Some(token.trim().to_owned());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        Ok(())
    }

    pub fn profile_endpoint(&self) -> String {
        format!("{}/{}", self.profile_url.trim_end_matches('/'), self.username)
    }

    pub fn calendar_endpoint(&self) -> String {
        format!("{}/{}", self.calendar_url.trim_end_matches('/'), self.username)
    }

    pub fn events_endpoint(&self) -> String {
        format!(
            "{}/{}/events/public",
            self.events_url.trim_end_matches('/'),
            self.username
        )
    }
}

pub fn storage_dir() -> Result<PathBuf, ConfigError> {
    let home = env::var("HOME").map_err(|_| ConfigError::HomeDirMissing)?;
    Ok(PathBuf::from(home).join(STORAGE_DIR_NAME))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME environment variable is not set; cannot locate ~/.activity-dashboard")]
    HomeDirMissing,
    #[error("I/O error while reading configuration: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("A GitHub username is required")]
    MissingUsername,
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
