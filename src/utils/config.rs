//! Configuration for the collaborators built on top of the protocol core.
//!
//! This module provides TOML-based configuration with support for multiple
//! configuration sources (default, file-based, environment variables) and
//! validation of configuration parameters. Every field has a documented
//! default so partial files are accepted.

use crate::crypto::identifier_to_public_key;
use crate::utils::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "peercrypt.toml";

/// Environment variable prefix for configuration
pub const ENV_PREFIX: &str = "PEERCRYPT";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeercryptConfig {
    /// Signaling server settings
    pub server: ServerConfig,
    /// Client settings
    pub client: ClientConfig,
    /// Push relay settings
    pub push: PushConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Settings of the signaling server role that enforces the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Mount path of the signaling endpoint (default "/")
    pub path: String,
    /// Application key of the signaling server (default "peerjs")
    pub key: String,
    /// Milliseconds before an unanswered offer expires (default 5000)
    pub expire_timeout_ms: u64,
    /// Milliseconds without heartbeat before a client is dropped (default 60000)
    pub alive_timeout_ms: u64,
    /// Maximum concurrent clients (default 5000)
    pub concurrent_limit: usize,
    /// Whether connected peer ids may be listed (default false)
    pub allow_discovery: bool,
    /// Whether the server sits behind a reverse proxy (default false)
    pub proxied: bool,
}

/// Settings of a client connecting to a signaling server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Public identifier of a secured server; `None` connects to any server
    pub server_id: Option<String>,
    /// Server host (default "localhost")
    pub host: String,
    /// Server port (default 9000)
    pub port: u16,
    /// Use TLS (default false)
    pub secure: bool,
    /// Server path (default "/")
    pub path: String,
    /// How long the secured-server probe waits for a disconnect (default 5000)
    pub probe_timeout_ms: u64,
}

/// Settings shared by the push relay and its clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Mount path of the push API (default "/push")
    pub path: String,
    /// VAPID subject sent to push services (default "mailto:test@test.org")
    pub vapid_subject: String,
    /// Payloads whose JSON form reaches this size are refused (default 4000)
    pub push_max_bytes: usize,
    /// Relay host (default "localhost")
    pub host: String,
    /// Relay port (default 9001)
    pub port: u16,
    /// Use TLS (default false)
    pub secure: bool,
    /// Public identifier of the relay
    pub server_public_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Prefix records with a timestamp
    pub timestamps: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            key: "peerjs".to_string(),
            expire_timeout_ms: 5000,
            alive_timeout_ms: 60_000,
            concurrent_limit: 5000,
            allow_discovery: false,
            proxied: false,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_id: None,
            host: "localhost".to_string(),
            port: 9000,
            secure: false,
            path: "/".to_string(),
            probe_timeout_ms: crate::defaults::DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            path: "/push".to_string(),
            vapid_subject: "mailto:test@test.org".to_string(),
            push_max_bytes: crate::defaults::DEFAULT_PUSH_MAX_BYTES,
            host: "localhost".to_string(),
            port: 9001,
            secure: false,
            server_public_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            timestamps: true,
        }
    }
}

impl PeercryptConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with multiple sources (default, file, environment)
    ///
    /// An explicit path must exist. Without one, `peercrypt.toml` in the
    /// working directory and then in the platform config directory are tried.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_file {
            config = Self::from_file(path)?;
        } else {
            let default_locations = [
                PathBuf::from(DEFAULT_CONFIG_FILE),
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("peercrypt")
                    .join(DEFAULT_CONFIG_FILE),
            ];

            for location in &default_locations {
                if location.exists() {
                    config = Self::from_file(location)?;
                    break;
                }
            }
        }

        config = config.merge_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Overlay `PEERCRYPT_*` environment variables
    fn merge_from_env(mut self) -> Result<Self> {
        if let Ok(server_id) = std::env::var(format!("{ENV_PREFIX}_CLIENT_SERVER_ID")) {
            self.client.server_id = Some(server_id);
        }

        if let Ok(timeout) = std::env::var(format!("{ENV_PREFIX}_CLIENT_PROBE_TIMEOUT_MS")) {
            self.client.probe_timeout_ms =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: format!("{ENV_PREFIX}_CLIENT_PROBE_TIMEOUT_MS"),
                    value: timeout,
                })?;
        }

        if let Ok(max) = std::env::var(format!("{ENV_PREFIX}_PUSH_MAX_BYTES")) {
            self.push.push_max_bytes = max.parse().map_err(|_| ConfigError::InvalidValue {
                field: format!("{ENV_PREFIX}_PUSH_MAX_BYTES"),
                value: max,
            })?;
        }

        if let Ok(level) = std::env::var(format!("{ENV_PREFIX}_LOGGING_LEVEL")) {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("server.expire_timeout_ms", self.server.expire_timeout_ms),
            ("server.alive_timeout_ms", self.server.alive_timeout_ms),
            ("server.concurrent_limit", self.server.concurrent_limit as u64),
            ("client.port", u64::from(self.client.port)),
            ("client.probe_timeout_ms", self.client.probe_timeout_ms),
            ("push.port", u64::from(self.push.port)),
            ("push.push_max_bytes", self.push.push_max_bytes as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "0"));
            }
        }

        let identifiers = [
            ("client.server_id", &self.client.server_id),
            ("push.server_public_key", &self.push.server_public_key),
        ];
        for (field, value) in identifiers {
            if let Some(id) = value {
                if identifier_to_public_key(id).is_err() {
                    return Err(invalid(field, id));
                }
            }
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => return Err(invalid("logging.level", other)),
        }

        Ok(())
    }

    /// Get the configuration as a pretty-printed TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::ParseError {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn invalid(field: &str, value: &str) -> crate::utils::PeercryptError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PeercryptConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client.probe_timeout_ms, 5000);
        assert_eq!(config.push.push_max_bytes, 4000);
        assert_eq!(config.server.path, "/");
        assert!(config.client.server_id.is_none());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = PeercryptConfig::default();
        config.client.probe_timeout_ms = 1200;
        let temp_file = NamedTempFile::new().unwrap();

        config.save(temp_file.path()).unwrap();
        let loaded = PeercryptConfig::from_file(temp_file.path()).unwrap();

        assert_eq!(loaded.client.probe_timeout_ms, 1200);
        assert_eq!(loaded.push.vapid_subject, config.push.vapid_subject);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[push]\npush_max_bytes = 2048").unwrap();

        let loaded = PeercryptConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.push.push_max_bytes, 2048);
        assert_eq!(loaded.push.path, "/push");
        assert_eq!(loaded.server.concurrent_limit, 5000);
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = PeercryptConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PeercryptConfig::default();
        config.client.probe_timeout_ms = 0;
        assert!(config.validate().is_err());

        config = PeercryptConfig::default();
        config.client.server_id = Some("not an identifier".to_string());
        assert!(config.validate().is_err());

        config = PeercryptConfig::default();
        config.client.server_id = Some("ab".repeat(32));
        assert!(config.validate().is_ok());

        config = PeercryptConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("PEERCRYPT_PUSH_MAX_BYTES", "1234");
        let config = PeercryptConfig::default().merge_from_env().unwrap();
        std::env::remove_var("PEERCRYPT_PUSH_MAX_BYTES");

        assert_eq!(config.push.push_max_bytes, 1234);
    }
}
