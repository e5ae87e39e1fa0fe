//! Configuration loading
//!
//! The config file is JSON with comments allowed. A missing file means
//! defaults; a present file must parse and contain only known fields.

pub mod paths;
pub mod schema;
pub mod validation;

pub use schema::Config;
pub use validation::{ValidationError, ValidationWarning, validate_config};

use jsonc_parser::ParseOptions;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoConfigPath,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config in {path}: {source}")]
    Schema {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Parse config text (JSONC)
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let value = jsonc_parser::parse_to_serde_value(text, &ParseOptions::default())
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

    serde_json::from_value(value).map_err(|source| ConfigError::Schema {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the config at `path`, falling back to defaults when it is absent
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text, path)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load and validate the config, resolving its path
///
/// Returns the config, the path it was resolved from and any warnings.
pub fn load_config_or_default(
    explicit: Option<PathBuf>,
) -> Result<(Config, PathBuf, Vec<ValidationWarning>), ConfigError> {
    let path = paths::get_config_path(explicit).ok_or(ConfigError::NoConfigPath)?;
    let config = load_config_from(&path)?;
    let warnings = validate_config(&config)?;
    Ok((config, path, warnings))
}

/// Write the config as pretty JSON, creating parent directories
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Schema {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json + "\n").map_err(write_err)
}
