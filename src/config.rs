//! Daemon configuration: TOML (or YAML) file, then environment overrides.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation
//! - 10/16/2026 - Accept `.yaml`/`.yml` files with the same keys

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::gateway::Login;

/// Shortest cooldown the responder accepts.
pub const MIN_RESPONSE_TIMEOUT_HOURS: u32 = 1;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub app_id: i32,
    pub app_hash: String,
    pub phone: String,
    pub password: Option<String>,
    pub session_file: String,
    pub response_message: String,
    pub response_timeout_hours: u32,
    pub log_level: String,
    pub log_file: Option<String>,
    pub enable_daemon_mode: bool,
    pub pid_file: String,
    pub bridge_socket: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: 0,
            app_hash: String::new(),
            phone: String::new(),
            password: None,
            session_file: "~/.away-responder/session.json".to_string(),
            response_message:
                "Hi! I'm no longer using Telegram. Please contact me via email or other means."
                    .to_string(),
            response_timeout_hours: 24,
            log_level: "info".to_string(),
            log_file: None,
            enable_daemon_mode: false,
            pid_file: "~/.away-responder/away-responder.pid".to_string(),
            bridge_socket: "~/.away-responder/bridge.sock".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Default config path.
///
/// Tries multiple locations in order:
/// 1. AWAY_RESPONDER_CONFIG env var
/// 2. ./config.toml, then ./config.yaml
/// 3. <config dir>/away-responder/config.toml
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("AWAY_RESPONDER_CONFIG") {
        return PathBuf::from(path);
    }

    let local = PathBuf::from("config.toml");
    if local.exists() {
        return local;
    }
    let legacy = PathBuf::from("config.yaml");
    if legacy.exists() {
        return legacy;
    }

    dirs::config_dir()
        .map(|dir| dir.join("away-responder").join("config.toml"))
        .unwrap_or(local)
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

impl Config {
    /// Load from `path` (or the default path), then apply environment
    /// overrides. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            Self::parse(&path, &contents)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok((config, path))
    }

    /// Parse by file extension: `.yaml`/`.yml` as YAML, anything else as TOML.
    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        );

        if is_yaml {
            Self::from_yaml(contents).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            Self::from_toml(contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Override fields from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("APP_ID") {
            self.app_id = parse_env("APP_ID", &v)?;
        }
        if let Some(v) = get("APP_HASH") {
            self.app_hash = v;
        }
        if let Some(v) = get("SESSION_FILE") {
            self.session_file = v;
        }
        if let Some(v) = get("PHONE") {
            self.phone = v;
        }
        if let Some(v) = get("PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = get("RESPONSE_MSG") {
            self.response_message = v;
        }
        if let Some(v) = get("RESPONSE_TIMEOUT_HOURS") {
            self.response_timeout_hours = parse_env("RESPONSE_TIMEOUT_HOURS", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("LOG_FILE") {
            self.log_file = Some(v);
        }
        if let Some(v) = get("ENABLE_DAEMON_MODE") {
            self.enable_daemon_mode = v == "true" || v == "1";
        }
        if let Some(v) = get("PID_FILE") {
            self.pid_file = v;
        }
        if let Some(v) = get("BRIDGE_SOCKET") {
            self.bridge_socket = v;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", &v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id == 0 {
            return Err(ConfigError::Missing("app_id"));
        }
        if self.app_hash.trim().is_empty() {
            return Err(ConfigError::Missing("app_hash"));
        }
        if self.phone.trim().is_empty() {
            return Err(ConfigError::Missing("phone"));
        }
        if self.response_message.trim().is_empty() {
            return Err(ConfigError::Missing("response_message"));
        }
        if self.response_timeout_hours < MIN_RESPONSE_TIMEOUT_HOURS {
            return Err(ConfigError::Invalid {
                field: "response_timeout_hours",
                reason: format!("must be at least {}", MIN_RESPONSE_TIMEOUT_HOURS),
            });
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Minimum time between two auto-replies to the same sender.
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.response_timeout_hours))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn login(&self) -> Login {
        Login {
            app_id: self.app_id,
            app_hash: self.app_hash.clone(),
            phone: self.phone.clone(),
            password: self.password.clone().filter(|p| !p.is_empty()),
            session_file: self.session_path(),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        expand_path(&self.session_file)
    }

    pub fn pid_path(&self) -> PathBuf {
        expand_path(&self.pid_file)
    }

    pub fn bridge_socket_path(&self) -> PathBuf {
        expand_path(&self.bridge_socket)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(expand_path)
    }

    /// Effective settings with secrets masked, for display.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "app_id": self.app_id,
            "app_hash": mask(&self.app_hash),
            "phone": self.phone,
            "password": self.password.as_deref().map(mask),
            "session_file": self.session_path(),
            "response_message": self.response_message,
            "response_timeout_hours": self.response_timeout_hours,
            "log_level": self.log_level,
            "log_file": self.log_path(),
            "enable_daemon_mode": self.enable_daemon_mode,
            "pid_file": self.pid_path(),
            "bridge_socket": self.bridge_socket_path(),
            "request_timeout_secs": self.request_timeout_secs,
        })
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}
