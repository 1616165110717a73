use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::client::API_ENDPOINT;
use crate::error::{LinearError, Result};

pub const API_KEY_ENV: &str = "LINEAR_API_KEY";
pub const CACHE_TTL_ENV: &str = "CACHE_TTL";

/// Settings read from `config.toml`. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// GraphQL endpoint, the public Linear API when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<Url>,
    pub cache_ttl_secs: u64,
    pub rate_limit_per_hour: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub request_timeout_secs: u64,
    pub issue_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            cache_ttl_secs: 3600,
            rate_limit_per_hour: 1000,
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
            request_timeout_secs: 30,
            issue_concurrency: 4,
        }
    }
}

impl Config {
    /// Load the user's config file (defaults when absent), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)?.with_env_overrides()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| LinearError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| LinearError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn config_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "linear-timeline")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(LinearError::NoConfigDir)
    }

    /// `CACHE_TTL` (seconds) replaces `cache_ttl_secs`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(CACHE_TTL_ENV) {
            self.cache_ttl_secs = parse_secs(CACHE_TTL_ENV, &value)?;
        }
        Ok(self)
    }

    /// Get API key with env var taking precedence over config file
    pub fn api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }

        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LinearError::MissingApiKey)
    }

    pub fn endpoint(&self) -> Result<Url> {
        match &self.api_url {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(API_ENDPOINT)?),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }

    /// Write the config as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| {
            LinearError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Parse a whole number of seconds, as given in `CACHE_TTL` or at the init prompt.
pub fn parse_secs(name: &'static str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| LinearError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.endpoint().unwrap().as_str(), API_ENDPOINT);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
api_key = "lin_api_file"
api_url = "http://localhost:8080/graphql"
issue_concurrency = 8
"#,
        );
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("lin_api_file"));
        assert_eq!(config.endpoint().unwrap().as_str(), "http://localhost:8080/graphql");
        assert_eq!(config.issue_concurrency, 8);
        assert_eq!(config.rate_limit_per_hour, 1000);
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "cache_ttl_secs = \"soon\"");
        assert!(matches!(
            Config::load_from(&path),
            Err(LinearError::ConfigParse { .. })
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            api_key: Some("lin_api_saved".into()),
            cache_ttl_secs: 60,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn env_api_key_wins_over_file() {
        let config = Config {
            api_key: Some("lin_api_file".into()),
            ..Config::default()
        };

        std::env::set_var(API_KEY_ENV, "lin_api_env");
        assert_eq!(config.api_key().unwrap(), "lin_api_env");

        std::env::set_var(API_KEY_ENV, "  ");
        assert_eq!(config.api_key().unwrap(), "lin_api_file");

        std::env::remove_var(API_KEY_ENV);
        assert!(matches!(
            Config::default().api_key(),
            Err(LinearError::MissingApiKey)
        ));
    }

    #[test]
    fn seconds_are_parsed_leniently_around_whitespace() {
        assert_eq!(parse_secs("cache_ttl_secs", " 90\n").unwrap(), 90);
        let err = parse_secs("cache_ttl_secs", "-5").unwrap_err();
        assert!(matches!(
            err,
            LinearError::InvalidValue { name: "cache_ttl_secs", ref value } if value == "-5"
        ));
    }

    #[test]
    #[serial]
    fn cache_ttl_env_overrides_file() {
        std::env::set_var(CACHE_TTL_ENV, "120");
        let config = Config::default().with_env_overrides().unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));

        std::env::set_var(CACHE_TTL_ENV, "an hour");
        let err = Config::default().with_env_overrides().unwrap_err();
        assert!(matches!(err, LinearError::InvalidValue { name: CACHE_TTL_ENV, .. }));

        std::env::remove_var(CACHE_TTL_ENV);
    }
}
