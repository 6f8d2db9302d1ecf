use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;
use tracing::debug;

use crate::core::config::data::Config;

/// Errors that can occur when loading configuration or resolving a provider from it.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Provider '{0}' is not configured")]
    UnknownProvider(String),

    #[error("No API key found for provider '{0}'")]
    MissingApiKey(String),

    #[error(
        "No provider configured and OPENAI_API_KEY is not set.\n\
Add a [[providers]] entry to the config file, or export OPENAI_API_KEY (and optionally OPENAI_BASE_URL)."
    )]
    NoProvider,
}

impl Config {
    /// Loads the config from the platform location, or the defaults if there is none.
    pub fn load() -> Result<Config, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Config::default()),
        }
    }

    /// A missing file is not an error; it yields the default config.
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file; using defaults");
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "chatgate", "chatgate")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
