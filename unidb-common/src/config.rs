//! Bootstrap configuration
//!
//! A small TOML file carries the settings a bootstrap run needs before the
//! store is open. Every field is optional; a missing file means defaults.
//!
//! ```toml
//! database_path = "/var/lib/unidb/university.db"
//! import_dir = "/srv/oulad"
//!
//! [logging]
//! level = "debug"
//!
//! [migration]
//! guard_collection = "grades"
//!
//! [cleanup]
//! collection = "students"
//! key = "id_student"
//! ```
//!
//! Database path resolution priority:
//! 1. Command-line argument
//! 2. Environment variable (`UNIDB_DATABASE`)
//! 3. TOML config file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the database path
pub const DATABASE_ENV_VAR: &str = "UNIDB_DATABASE";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "UNIDB_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Directory holding the raw dataset export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_dir: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Migration guard
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// The migration is skipped while this collection holds documents
    #[serde(default = "default_guard_collection")]
    pub guard_collection: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            guard_collection: default_guard_collection(),
        }
    }
}

/// Duplicate cleanup target
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_collection")]
    pub collection: String,
    #[serde(default = "default_cleanup_key")]
    pub key: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            collection: default_cleanup_collection(),
            key: default_cleanup_key(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_guard_collection() -> String {
    crate::etl::DEFAULT_GUARD_COLLECTION.to_string()
}

fn default_cleanup_collection() -> String {
    crate::etl::STUDENTS.to_string()
}

fn default_cleanup_key() -> String {
    crate::etl::STUDENT_KEY.to_string()
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `path` (or the platform default location), falling back to
    /// defaults when the file does not exist
    ///
    /// A file that exists but cannot be parsed is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let candidate = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };

        match candidate {
            Some(path) if path.is_file() => {
                let config = Self::load(&path)?;
                info!("Loaded configuration from {:?}", path);
                Ok((config, ConfigSource::File(path)))
            }
            Some(path) => {
                warn!("Config file {:?} not found, using defaults", path);
                Ok((Self::default(), ConfigSource::Defaults))
            }
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }
}

/// Resolve the database path: CLI, then environment, then TOML, then the
/// compiled default
pub fn resolve_database_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.database_path {
        return path.clone();
    }

    default_database_path()
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("unidb"))
        .unwrap_or_else(|| PathBuf::from("./unidb_data"))
        .join("university.db")
}

/// OS-dependent default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("unidb").join("config.toml"))
}
