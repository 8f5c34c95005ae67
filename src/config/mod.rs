//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::game::MovementConfig;

/// Default cap on simultaneously connected characters
const DEFAULT_MAX_PLAYERS: usize = 32;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma separated); `None` allows any
    pub client_origin: Option<String>,
    /// JSON level file; the built-in practice level when unset
    pub level_path: Option<PathBuf>,
    /// JSON movement tuning; defaults when unset
    pub movement_config_path: Option<PathBuf>,
    pub max_players: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let max_players = match env::var("MAX_PLAYERS") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("MAX_PLAYERS"))?,
            Err(_) => DEFAULT_MAX_PLAYERS,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: non_empty_var("CLIENT_ORIGIN"),
            level_path: non_empty_var("LEVEL_PATH").map(PathBuf::from),
            movement_config_path: non_empty_var("MOVEMENT_CONFIG_PATH").map(PathBuf::from),
            max_players,
        })
    }

    /// Movement tuning from `movement_config_path`, or the defaults.
    /// Fields missing from the file keep their default values.
    pub fn load_movement_config(&self) -> Result<MovementConfig, ConfigError> {
        let Some(path) = &self.movement_config_path else {
            return Ok(MovementConfig::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            server_addr: "127.0.0.1:8080".parse().expect("valid address"),
            log_level: "info".to_string(),
            client_origin: None,
            level_path: None,
            movement_config_path: None,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    #[test]
    fn test_movement_config_defaults_without_path() {
        let movement = config().load_movement_config().expect("defaults");
        assert_eq!(movement, MovementConfig::default());
    }

    #[test]
    fn test_partial_movement_file_keeps_defaults() {
        let path = env::temp_dir().join(format!("movement-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "gravity": 30.0, "auto_bhop": false }"#).expect("write temp file");

        let cfg = Config {
            movement_config_path: Some(path.clone()),
            ..config()
        };
        let movement = cfg.load_movement_config().expect("valid file");
        let _ = std::fs::remove_file(&path);

        assert_eq!(movement.gravity, 30.0);
        assert!(!movement.auto_bhop);
        assert_eq!(movement.walk_speed, MovementConfig::default().walk_speed);
    }

    #[test]
    fn test_missing_movement_file_is_reported() {
        let cfg = Config {
            movement_config_path: Some(PathBuf::from("/nonexistent/movement.json")),
            ..config()
        };
        assert!(matches!(cfg.load_movement_config(), Err(ConfigError::Io { .. })));
    }
}
