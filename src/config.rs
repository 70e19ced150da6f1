//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `GYMSENSE_*` environment overrides.

use crate::api::ClientConfig;
use crate::live::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where [`Config::discover`] found its configuration
#[derive(Debug, Default)]
pub struct ConfigSource {
    /// File the config came from, `None` for defaults
    pub loaded: Option<PathBuf>,
    /// Files that exist but could not be loaded
    pub skipped: Vec<ConfigError>,
}

impl ConfigSource {
    pub fn log(&self) {
        for error in &self.skipped {
            tracing::warn!("Failed to load config: {}", error);
        }
        match &self.loaded {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub live: LiveConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://gymsense-api-production.up.railway.app".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Live update channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_live_enabled")]
    pub enabled: bool,

    #[serde(default = "default_live_path")]
    pub path: String,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Unlimited when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

fn default_live_enabled() -> bool {
    true
}

fn default_live_path() -> String {
    "/sse".to_string()
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    30_000
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: default_live_enabled(),
            path: default_live_path(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_attempts: None,
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Fixed id for availability requests; random per run when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<String>,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("gymsense").to_string_lossy().to_string())
        .unwrap_or_else(|| "./gymsense_data".to_string())
}

fn default_persist() -> bool {
    true
}

impl SessionConfig {
    /// `data_dir` with a leading `~/` expanded
    pub fn data_path(&self) -> PathBuf {
        match (self.data_dir.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.data_dir),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist: default_persist(),
            anonymous_id: None,
        }
    }
}

/// Notification presentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Treat the app as focused at startup
    #[serde(default = "default_assume_focused")]
    pub assume_focused: bool,

    /// Answer to the system notification permission request
    #[serde(default = "default_allow_system")]
    pub allow_system: bool,
}

fn default_assume_focused() -> bool {
    true
}

fn default_allow_system() -> bool {
    true
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            assume_focused: default_assume_focused(),
            allow_system: default_allow_system(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let (config, source) = Self::discover(&Self::default_paths());
        source.log();
        config
    }

    /// Load the first readable file in `paths`, falling back to defaults
    /// with environment overrides. Nothing is logged; the returned
    /// [`ConfigSource`] says what happened.
    pub fn discover(paths: &[PathBuf]) -> (Self, ConfigSource) {
        let mut skipped = Vec::new();
        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return (
                        config,
                        ConfigSource {
                            loaded: Some(path.clone()),
                            skipped,
                        },
                    )
                }
                Err(e) => skipped.push(e),
            }
        }

        (
            Self::from_env(),
            ConfigSource {
                loaded: None,
                skipped,
            },
        )
    }

    /// Config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("gymsense").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(url) = var("GYMSENSE_API_URL") {
            self.api.base_url = url;
        }
        if let Some(secs) = var("GYMSENSE_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.api.request_timeout_secs = secs;
        }

        // Live overrides
        if let Some(enabled) = var("GYMSENSE_LIVE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.live.enabled = enabled;
        }
        if let Some(path) = var("GYMSENSE_LIVE_PATH") {
            self.live.path = path;
        }

        // Session overrides
        if let Some(data_dir) = var("GYMSENSE_DATA_DIR") {
            self.session.data_dir = data_dir;
        }
        if let Some(persist) = var("GYMSENSE_PERSIST_SESSION").and_then(|v| parse_bool(&v)) {
            self.session.persist = persist;
        }

        // Logging overrides
        if let Some(level) = var("GYMSENSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("GYMSENSE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// REST client settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            request_timeout_ms: self.api.request_timeout_secs.saturating_mul(1000),
        }
    }

    /// Live channel reconnect settings
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.live.initial_backoff_ms),
            max_delay: Duration::from_millis(self.live.max_backoff_ms),
            max_attempts: self.live.max_attempts,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# GymSense Configuration
#
# Environment variables override these settings:
# - GYMSENSE_API_URL
# - GYMSENSE_REQUEST_TIMEOUT
# - GYMSENSE_LIVE_ENABLED
# - GYMSENSE_LIVE_PATH
# - GYMSENSE_DATA_DIR
# - GYMSENSE_PERSIST_SESSION
# - GYMSENSE_LOG_LEVEL
# - GYMSENSE_LOG_FORMAT

[api]
# GymSense API base URL
base_url = "https://gymsense-api-production.up.railway.app"

# Request timeout in seconds
request_timeout_secs = 30

[live]
# Subscribe to server-sent events
enabled = true

# Event stream path, relative to the API base URL
path = "/sse"

# Reconnect backoff (ms)
initial_backoff_ms = 1000
max_backoff_ms = 30000

# Give up after this many failed reconnects (unlimited when unset)
# max_attempts = 10

[session]
# Directory holding the persisted session (user.json)
data_dir = "~/.local/share/gymsense"

# Keep the session across restarts
persist = true

[notifications]
# Treat the terminal as focused (toasts instead of system notifications)
assume_focused = true

# Allow system notifications
allow_system = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.live.path, "/sse");
        assert!(config.live.max_attempts.is_none());
        assert!(config.session.persist);
        assert_eq!(config.client_config().request_timeout_ms, 30_000);
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.api.base_url, default_base_url());
        assert_eq!(config.live.max_backoff_ms, 30_000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"http://localhost:3000\"\n\n[live]\nmax_attempts = 3\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:3000");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.reconnect_policy().max_attempts, Some(3));
        assert_eq!(
            config.reconnect_policy().initial_delay,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_discover_skips_broken_files() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("config.toml");
        std::fs::write(&broken, "[api\nbase_url = 1").unwrap();
        std::fs::write(&good, "[live]\nmax_attempts = 4\n").unwrap();

        let paths = vec![dir.path().join("missing.toml"), broken, good.clone()];
        let (config, source) = Config::discover(&paths);
        assert_eq!(config.live.max_attempts, Some(4));
        assert_eq!(source.loaded, Some(good));
        assert_eq!(source.skipped.len(), 1);
        assert!(matches!(source.skipped[0], ConfigError::Parse { .. }));

        let (config, source) = Config::discover(&paths[..2]);
        assert!(config.live.max_attempts.is_none());
        assert!(source.loaded.is_none());
        assert_eq!(source.skipped.len(), 1);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[api\nbase_url = 1").unwrap();
        assert!(matches!(
            Config::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GYMSENSE_API_URL", "http://api.test"),
            ("GYMSENSE_REQUEST_TIMEOUT", "5"),
            ("GYMSENSE_LIVE_ENABLED", "off"),
            ("GYMSENSE_PERSIST_SESSION", "maybe"),
            ("GYMSENSE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "http://api.test");
        assert_eq!(config.client_config().request_timeout_ms, 5_000);
        assert!(!config.live.enabled);
        // Unparseable values leave the setting alone
        assert!(config.session.persist);
        assert_eq!(config.logging.format, "json");
    }
}
