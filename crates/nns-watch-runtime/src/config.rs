//! # Runtime Configuration
//!
//! Layered, later wins:
//!
//! 1. Built-in defaults
//! 2. JSON settings file (missing is fine, malformed is an error)
//! 3. `NNS_WATCH_*` environment variables
//! 4. Command-line flags
//!
//! | Variable | Field |
//! |----------|-------|
//! | `NNS_WATCH_TOKEN` | `token` |
//! | `NNS_WATCH_FEED_URL` | `feed_url` |
//! | `NNS_WATCH_POLL_INTERVAL_SECS` | `poll_interval_secs` |
//! | `NNS_WATCH_PERSIST_INTERVAL_SECS` | `persist_interval_secs` |
//! | `NNS_WATCH_STATE_PATH` | `state_path` |
//! | `NNS_WATCH_METRICS_PORT` | `metrics_port` |

use nns_watch_core::{DEFAULT_DASHBOARD_URL, DEFAULT_MAX_SUMMARY_LENGTH};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Public NNS proposal feed.
pub const DEFAULT_FEED_URL: &str = "https://cb3bp-ciaaa-aaaai-qkw4q-cai.raw.ic0.app";

/// Telegram Bot API root.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Bot token is not set. Put it in the settings file or NNS_WATCH_TOKEN.")]
    MissingToken,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Telegram bot token.
    pub token: String,
    pub feed_url: String,
    pub telegram_api_url: String,
    pub poll_interval_secs: u64,
    pub persist_interval_secs: u64,
    pub state_path: PathBuf,
    pub max_summary_length: usize,
    pub delivery_timeout_secs: u64,
    pub long_poll_timeout_secs: u64,
    pub dashboard_url: String,
    /// Port for `/metrics` and `/health`; disabled when unset.
    pub metrics_port: Option<u16>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            poll_interval_secs: 300,
            persist_interval_secs: 60,
            state_path: PathBuf::from("state.json"),
            max_summary_length: DEFAULT_MAX_SUMMARY_LENGTH,
            delivery_timeout_secs: 10,
            long_poll_timeout_secs: 60,
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            metrics_port: None,
        }
    }
}

/// Flag overrides collected by the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub state_path: Option<PathBuf>,
    pub metrics_port: Option<u16>,
}

impl RuntimeConfig {
    /// Load every layer from the real environment and validate the result.
    pub fn load(settings_path: &Path, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(settings_path)?;
        config.apply_env(|var| std::env::var(var).ok())?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the settings file, if it exists.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(token) = lookup("NNS_WATCH_TOKEN") {
            self.token = token;
        }
        if let Some(url) = lookup("NNS_WATCH_FEED_URL") {
            self.feed_url = url;
        }
        if let Some(secs) = parse_env(&lookup, "NNS_WATCH_POLL_INTERVAL_SECS")? {
            self.poll_interval_secs = secs;
        }
        if let Some(secs) = parse_env(&lookup, "NNS_WATCH_PERSIST_INTERVAL_SECS")? {
            self.persist_interval_secs = secs;
        }
        if let Some(path) = lookup("NNS_WATCH_STATE_PATH") {
            self.state_path = PathBuf::from(path);
        }
        if let Some(port) = parse_env(&lookup, "NNS_WATCH_METRICS_PORT")? {
            self.metrics_port = Some(port);
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(path) = &cli.state_path {
            self.state_path = path.clone();
        }
        if let Some(port) = cli.metrics_port {
            self.metrics_port = Some(port);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let positive = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("persist_interval_secs", self.persist_interval_secs),
            ("delivery_timeout_secs", self.delivery_timeout_secs),
            ("long_poll_timeout_secs", self.long_poll_timeout_secs),
            ("max_summary_length", self.max_summary_length as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_secs)
    }
}

fn parse_env<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.persist_interval_secs, 60);
        assert_eq!(config.state_path, PathBuf::from("state.json"));
        assert_eq!(config.max_summary_length, 2048);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RuntimeConfig::from_file(&dir.path().join("settings.json")).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_settings_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        // Extra keys from older settings files are ignored.
        std::fs::write(
            &path,
            r#"{"token": "abc", "chatId": 12, "poll_interval_secs": 30, "metrics_port": 9100}"#,
        )
        .unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.persist_interval_secs, 60);
    }

    #[test]
    fn test_malformed_settings_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{token").unwrap();

        assert!(matches!(
            RuntimeConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = RuntimeConfig {
            token: "from-file".to_string(),
            ..RuntimeConfig::default()
        };
        config
            .apply_env(env(&[
                ("NNS_WATCH_TOKEN", "from-env"),
                ("NNS_WATCH_POLL_INTERVAL_SECS", " 15 "),
                ("NNS_WATCH_STATE_PATH", "/var/lib/nns/state.json"),
            ]))
            .unwrap();

        assert_eq!(config.token, "from-env");
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.state_path, PathBuf::from("/var/lib/nns/state.json"));
    }

    #[test]
    fn test_invalid_env_value_rejected() {
        let mut config = RuntimeConfig::default();
        let err = config
            .apply_env(env(&[("NNS_WATCH_METRICS_PORT", "ninety")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "NNS_WATCH_METRICS_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_cli_wins_over_env() {
        let mut config = RuntimeConfig::default();
        config
            .apply_env(env(&[("NNS_WATCH_METRICS_PORT", "9000")]))
            .unwrap();
        config.apply_cli(&CliOverrides {
            state_path: Some(PathBuf::from("cli.json")),
            metrics_port: Some(9500),
        });

        assert_eq!(config.metrics_port, Some(9500));
        assert_eq!(config.state_path, PathBuf::from("cli.json"));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            RuntimeConfig::default().validate(),
            Err(ConfigError::MissingToken)
        ));

        let valid = RuntimeConfig {
            token: "t".to_string(),
            ..RuntimeConfig::default()
        };
        assert!(valid.validate().is_ok());

        let zero_poll = RuntimeConfig {
            poll_interval_secs: 0,
            ..valid.clone()
        };
        assert!(matches!(
            zero_poll.validate(),
            Err(ConfigError::Zero {
                field: "poll_interval_secs"
            })
        ));

        let zero_summary = RuntimeConfig {
            max_summary_length: 0,
            ..valid
        };
        assert!(zero_summary.validate().is_err());
    }
}
