// Configuration loading and parsing (config/server.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire server.toml file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ServerFile {
    server: ServerSection,
    data: DataSection,
    auction: AuctionSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ServerSection {
    port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DataSection {
    players: String,
    storage: String,
}

impl Default for DataSection {
    fn default() -> Self {
        DataSection {
            players: "data/players.json".to_string(),
            storage: "data/rooms.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct AuctionSection {
    timer_duration: u32,
}

impl Default for AuctionSection {
    fn default() -> Self {
        AuctionSection { timer_duration: 15 }
    }
}

/// The assembled runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub players_path: PathBuf,
    pub storage_path: PathBuf,
    /// Countdown duration new rooms start with.
    pub timer_duration: u32,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// The countdown durations a room may run with.
const TIMER_CHOICES: [u32; 3] = [10, 15, 20];

/// Load configuration from `config/server.toml` relative to `base_dir`.
/// A missing file yields the defaults; every field is individually optional.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("server.toml");

    let file: ServerFile = if path.exists() {
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?
    } else {
        ServerFile::default()
    };

    let config = Config {
        port: file.server.port,
        players_path: base_dir.join(&file.data.players),
        storage_path: base_dir.join(&file.data.storage),
        timer_duration: file.auction.timer_duration,
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::ReadError {
        path: PathBuf::from("."),
        source: e,
    })?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if !TIMER_CHOICES.contains(&config.timer_duration) {
        return Err(ConfigError::ValidationError {
            field: "auction.timer_duration".into(),
            message: format!(
                "must be one of {TIMER_CHOICES:?}, got {}",
                config.timer_duration
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
