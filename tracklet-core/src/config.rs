//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tracklet/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tracklet/` (~/.config/tracklet/)
//! - State/Logs: `$XDG_STATE_HOME/tracklet/` (~/.local/state/tracklet/)

use crate::error::{Error, Result};
use crate::session::Environment;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Collector credentials per environment
    #[serde(default)]
    pub credentials: Credentials,

    /// Transport and retry settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The two credential sets `init` chooses between
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Credentials {
    #[serde(default)]
    pub test: CredentialSet,
    #[serde(default)]
    pub production: CredentialSet,
}

impl Credentials {
    /// Credential set for an environment
    pub fn for_environment(&self, environment: Environment) -> &CredentialSet {
        match environment {
            Environment::Test => &self.test,
            Environment::Production => &self.production,
        }
    }
}

/// Token and collector endpoint for one environment
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Project token
    #[serde(default)]
    pub token: String,
    /// Collector endpoint (e.g., `https://collector.example.com/capture`)
    #[serde(default)]
    pub api_link: String,
}

impl CredentialSet {
    pub fn new(token: impl Into<String>, api_link: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_link: api_link.into(),
        }
    }

    /// Both token and endpoint are present
    pub fn is_ready(&self) -> bool {
        !self.token.is_empty() && !self.api_link.is_empty()
    }
}

/// Transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Encoded payloads above this many bytes are compressed off the caller's task
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_payload_size: default_max_payload_size(),
            max_retries: default_max_retries(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "transport.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_retries > 10 {
            return Err(Error::Config(
                "transport.max_retries must be at most 10".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_payload_size() -> usize {
    crate::collector::MAX_SIZE
}

fn default_max_retries() -> u32 {
    3
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.transport.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tracklet/config.toml` (~/.config/tracklet/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tracklet").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tracklet/` (~/.local/state/tracklet/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tracklet")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tracklet.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.timeout_secs, 30);
        assert_eq!(config.transport.max_payload_size, 2048);
        assert_eq!(config.transport.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert!(!config.credentials.test.is_ready());
        assert!(!config.credentials.production.is_ready());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[credentials.test]
token = "test-token"
api_link = "https://staging.example.com/capture"

[credentials.production]
token = "prod-token"
api_link = "https://collector.example.com/capture"

[transport]
timeout_secs = 5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let test = config.credentials.for_environment(Environment::Test);
        assert_eq!(test.token, "test-token");
        assert_eq!(test.api_link, "https://staging.example.com/capture");

        let prod = config.credentials.for_environment(Environment::Production);
        assert_eq!(prod.token, "prod-token");
        assert!(prod.is_ready());

        assert_eq!(config.transport.timeout(), Duration::from_secs(5));
        assert_eq!(config.transport.max_retries, 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_transport_validation() {
        assert!(TransportConfig::default().validate().is_ok());

        let config = TransportConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TransportConfig {
            max_retries: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[credentials.production]\ntoken = \"t\"\napi_link = \"https://c.example.com\"\n"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert!(config.credentials.production.is_ready());
        assert!(!config.credentials.test.is_ready());
    }

    #[test]
    fn test_load_from_rejects_invalid_transport() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transport]\ntimeout_secs = 0\n").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
