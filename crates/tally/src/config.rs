//! Application configuration.
//!
//! Loaded from environment variables with the `TALLY` prefix, nested
//! values separated by `__`, after an optional `.env` file:
//!
//! - `TALLY__API__BASE_URL=https://budget.example.com/api` → `api.base_url`
//! - `TALLY__SESSION__STORAGE_DIR=/var/lib/tally` → `session.storage_dir`
//! - `TALLY__QUERY__RETRY_COUNT=1` → `query.retry_count`
//!
//! Every value has a default, so an empty environment is a valid
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tally_query::QueryConfig;
use tally_session::SessionConfig;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Where the budget API lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base address every endpoint path is joined to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Session lifetime and credential persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_access_lifetime_secs")]
    pub access_lifetime_secs: u64,

    /// Directory for the persisted credential. In memory when unset.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

fn default_access_lifetime_secs() -> u64 {
    SessionConfig::default().access_lifetime_secs
}

impl SessionSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            access_lifetime_secs: self.access_lifetime_secs,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_lifetime_secs: default_access_lifetime_secs(),
            storage_dir: None,
        }
    }
}

/// Log output.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// 1. Loads `.env` if present
    /// 2. Reads `TALLY__*` variables
    /// 3. Fills everything else from defaults
    ///
    /// # Errors
    /// [`ConfigError::Load`] when a value can't be parsed into its field.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env(None)
    }

    /// Like [`load()`](Self::load), but reads variables from `vars`
    /// instead of the process environment and skips `.env`.
    pub fn load_from(vars: config::Map<String, String>) -> Result<Self, ConfigError> {
        Self::from_env(Some(vars))
    }

    fn from_env(vars: Option<config::Map<String, String>>) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Checks values that parse but can't work.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for an empty or non-http(s) base URL, or a
    /// zero access lifetime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got {url}"
            )));
        }
        if self.session.access_lifetime_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.access_lifetime_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        let mut map = config::Map::new();
        for (k, v) in pairs {
            map.insert((*k).to_string(), (*v).to_string());
        }
        map
    }

    #[test]
    fn test_load_empty_environment_uses_defaults() {
        let config = AppConfig::load_from(vars(&[])).unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.session.access_lifetime_secs, 300);
        assert_eq!(config.session.storage_dir, None);
        assert_eq!(config.query, QueryConfig::default());
        assert_eq!(config.log.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_nested_variables() {
        let config = AppConfig::load_from(vars(&[
            ("TALLY__API__BASE_URL", "https://budget.example.com/api"),
            ("TALLY__SESSION__ACCESS_LIFETIME_SECS", "60"),
            ("TALLY__SESSION__STORAGE_DIR", "/tmp/tally"),
            ("TALLY__QUERY__REFETCH_ON_FOCUS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.api.base_url, "https://budget.example.com/api");
        assert_eq!(config.session.access_lifetime_secs, 60);
        assert_eq!(config.session.storage_dir, Some(PathBuf::from("/tmp/tally")));
        assert!(config.query.refetch_on_focus);
        assert_eq!(config.query.retry_count, 1);
    }

    #[test]
    fn test_load_unparseable_number_fails() {
        let result = AppConfig::load_from(vars(&[("TALLY__API__TIMEOUT_SECS", "soon")]));

        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut config = AppConfig::default();
        config.api.base_url = "ftp://budget".into();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.api.base_url = "   ".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_lifetime() {
        let mut config = AppConfig::default();
        config.session.access_lifetime_secs = 0;

        assert!(config.validate().is_err());
    }
}
