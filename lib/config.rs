//! Gateway configuration.
//!
//! Settings are read from a TOML file; every field has a default, so an absent file or section
//! yields a working configuration.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Accepted range of `fileinfo-cache.timeout-secs`.
pub const TIMEOUT_SECS_RANGE: RangeInclusive<u32> = 1..=3600;
/// Accepted range of `fileinfo-cache.max-size`.
pub const MAX_SIZE_RANGE: RangeInclusive<u32> = 100..=1_000_000;

const DEFAULT_TIMEOUT_SECS: u32 = 60;
const DEFAULT_MAX_SIZE: u32 = 1000;

fn default_timeout_secs() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_size() -> u32 {
    DEFAULT_MAX_SIZE
}

fn default_backing_root() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from("/var/lib/dsgate/data"),
        |dir| dir.join("dsgate").join("data"),
    )
}

/// Parameters of the per-export open-handle cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileInfoCacheConfig {
    /// Seconds an idle handle is kept before it may be closed, while under `max-size`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,

    /// Soft limit on the number of cached handles.
    #[serde(default = "default_max_size")]
    pub max_size: u32,
}

impl FileInfoCacheConfig {
    /// The grace period for idle handles.
    #[must_use]
    pub fn min_idle(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }

    /// The soft entry limit.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_size as usize
    }
}

impl Default for FileInfoCacheConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Where the local backing filesystem keeps its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackingConfig {
    /// Directory holding one file per inode.
    #[serde(default = "default_backing_root")]
    pub root: PathBuf,
}

impl Default for BackingConfig {
    fn default() -> Self {
        Self {
            root: default_backing_root(),
        }
    }
}

/// Application configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Open-handle cache settings applied to every export.
    #[serde(default)]
    pub fileinfo_cache: FileInfoCacheConfig,

    /// Local backing filesystem used by the CLI.
    #[serde(default)]
    pub backing: BackingConfig,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file parsed but holds out-of-range values.
    #[error("Configuration validation errors: {0:?}")]
    ValidationErrors(Vec<String>),

    /// The configuration could not be rendered as TOML.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    /// The file is not valid TOML for [`Config`].
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    /// The file could not be read.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns every violation found, not just the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !TIMEOUT_SECS_RANGE.contains(&self.fileinfo_cache.timeout_secs) {
            errors.push(format!(
                "fileinfo-cache.timeout-secs = {} is outside {}..={}.",
                self.fileinfo_cache.timeout_secs,
                TIMEOUT_SECS_RANGE.start(),
                TIMEOUT_SECS_RANGE.end()
            ));
        }

        if !MAX_SIZE_RANGE.contains(&self.fileinfo_cache.max_size) {
            errors.push(format!(
                "fileinfo-cache.max-size = {} is outside {}..={}.",
                self.fileinfo_cache.max_size,
                MAX_SIZE_RANGE.start(),
                MAX_SIZE_RANGE.end()
            ));
        }

        if self.backing.root.as_os_str().is_empty() {
            errors.push("backing.root must not be empty.".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns config file paths in descending priority order.
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("dsgate").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("dsgate").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/dsgate/config.toml"));

        paths
    }

    /// Finds the first existing config file from search paths.
    fn find_config_file() -> Option<PathBuf> {
        Self::config_search_paths().into_iter().find(|p| p.exists())
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads config from a single TOML file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Loads and validates the configuration.
    ///
    /// Reads `external_config_path` if given, otherwise the first existing file from the search
    /// paths, otherwise falls back to the defaults.
    pub fn load(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match external_config_path
            .map(Path::to_path_buf)
            .or_else(Self::find_config_file)
        {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                debug!("No configuration file found, using defaults.");
                Self::default()
            }
        };

        config
            .validate()
            .map_err(ConfigError::ValidationErrors)?;
        Ok(config)
    }
}
