//! Worker configuration loading from file and environment variables.
//!
//! The worker reads the same TOML file as the API server and ignores the
//! sections it does not use, so a single `config.toml` can drive a whole
//! deployment.

use serde::Deserialize;
use switchboard_voice::LiveKitConfig;
use thiserror::Error;

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LiveKit credentials and related knobs.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Call session settings.
    #[serde(default)]
    pub worker: SessionConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "switchboard_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Call session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long to wait for the remote participant before hanging up.
    #[serde(default = "default_participant_timeout_secs")]
    pub participant_timeout_secs: u64,
}

fn default_db_path() -> String {
    "switchboard.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_participant_timeout_secs() -> u64 {
    300
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            participant_timeout_secs: default_participant_timeout_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads worker configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SWITCHBOARD_DB_PATH` overrides `database.path`
/// - `SWITCHBOARD_LOG_LEVEL` overrides `logging.level`
/// - `SWITCHBOARD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `SWITCHBOARD_LIVEKIT_URL` overrides `livekit.url`
/// - `SWITCHBOARD_LIVEKIT_API_KEY` overrides `livekit.api_key`
/// - `SWITCHBOARD_LIVEKIT_API_SECRET` overrides `livekit.api_secret`
/// - `SWITCHBOARD_AGENT_NAME` overrides `livekit.agent_name`
/// - `SWITCHBOARD_PARTICIPANT_TIMEOUT_SECS` overrides `worker.participant_timeout_secs`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<WorkerConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                WorkerConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => WorkerConfig::default(),
    };

    // Environment variable overrides
    if let Ok(db_path) = std::env::var("SWITCHBOARD_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("SWITCHBOARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(url) = std::env::var("SWITCHBOARD_LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Ok(key) = std::env::var("SWITCHBOARD_LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Ok(secret) = std::env::var("SWITCHBOARD_LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }
    if let Ok(name) = std::env::var("SWITCHBOARD_AGENT_NAME") {
        config.livekit.agent_name = name;
    }
    if let Ok(timeout) = std::env::var("SWITCHBOARD_PARTICIPANT_TIMEOUT_SECS") {
        if let Ok(parsed) = timeout.parse() {
            config.worker.participant_timeout_secs = parsed;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_shared_config_file_ignoring_server_sections() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 3000

[database]
path = "/var/lib/switchboard/switchboard.db"

[livekit]
url = "wss://livekit.example.com"
api_key = "devkey"
api_secret = "devsecret"

[worker]
participant_timeout_secs = 120
"#
        )
        .expect("write config");

        let config =
            load_config(Some(file.path().to_str().expect("utf8 path"))).expect("load config");
        assert_eq!(config.database.path, "/var/lib/switchboard/switchboard.db");
        assert_eq!(config.livekit.url, "wss://livekit.example.com");
        assert_eq!(config.livekit.agent_name, "switchboard-agent");
        assert_eq!(config.worker.participant_timeout_secs, 120);
        assert_eq!(config.database.pool_max_size, 8);
    }
}
