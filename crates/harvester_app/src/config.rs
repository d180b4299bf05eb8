use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harvester_core::{FetchOptions, IssueState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "harvester.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings read from `harvester.ron`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub owner: String,
    pub repository: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default)]
    pub state: IssueState,
    /// When non-empty, only issues opened by these logins are written.
    #[serde(default)]
    pub allowed_authors: Vec<String>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Fetch tuning with millisecond durations. Zero keeps the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub max_workers: usize,
    pub retry_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub rate_limit_cooldown_ms: u64,
    pub fail_fast_on_permanent: bool,
}

impl OptionsConfig {
    pub fn to_fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_workers: self.max_workers,
            retry_attempts: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            rate_limit_cooldown: Duration::from_millis(self.rate_limit_cooldown_ms),
            fail_fast_on_permanent: self.fail_fast_on_permanent,
        }
        .normalized()
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&content)
    }

    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() || self.repository.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "owner and repository must not be empty".to_string(),
            ));
        }
        if self.output.file_name().is_none() {
            return Err(ConfigError::Invalid(format!(
                "output {:?} does not name a file",
                self.output
            )));
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("issues.json")
}
