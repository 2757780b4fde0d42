//! Configuration loading and config file resolution
//!
//! The TOML file is bootstrap-only: database selection, civil timezone, and
//! logging. Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `DANMU_CONFIG` environment variable
//! 3. User config directory (`~/.config/danmu/config.toml` on Linux)
//! 4. System config (`/etc/danmu/config.toml`, Linux only)
//!
//! A missing config file found by discovery (3 or 4) is not an error: defaults
//! apply and database writes stay disabled. An explicitly named file (1 or 2)
//! must exist.

use crate::{Error, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DANMU_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Database backend. Absent section means database writes are disabled.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Ingest pipeline tuning
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Sqlite,
    Mysql,
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseKind::Sqlite => write!(f, "sqlite"),
            DatabaseKind::Mysql => write!(f, "mysql"),
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub kind: DatabaseKind,

    /// SQLite database file
    #[serde(default = "default_sqlite_file")]
    pub sqlite_file: PathBuf,

    /// SQLite only: keep a `streamer_name_history` interval table next to
    /// `streamer` (default on). With `false` a rename just overwrites the name.
    #[serde(default = "default_name_history")]
    pub name_history: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_mysql_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_database_name")]
    pub database: String,
}

impl DatabaseConfig {
    /// SQLite configuration pointing at `path`, used for the `--sqlite` override
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            sqlite_file: path.into(),
            name_history: default_name_history(),
            host: default_host(),
            port: default_mysql_port(),
            user: default_user(),
            password: String::new(),
            database: default_database_name(),
        }
    }
}

/// `[ingest]` section
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Civil timezone of recorded start times, in whole hours east of UTC
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// How many leading lines are searched for a `LiveStartTime` comment
    #[serde(default = "default_start_time_scan_lines")]
    pub start_time_scan_lines: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            start_time_scan_lines: default_start_time_scan_lines(),
        }
    }
}

impl IngestConfig {
    /// Civil timezone as a chrono offset
    pub fn civil_offset(&self) -> Result<FixedOffset> {
        crate::time::civil_offset(self.utc_offset_hours)
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
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

fn default_sqlite_file() -> PathBuf {
    PathBuf::from("danmu.db")
}

fn default_name_history() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_user() -> String {
    "root".to_string()
}

fn default_database_name() -> String {
    "acfun".to_string()
}

fn default_utc_offset_hours() -> i32 {
    crate::time::DEFAULT_UTC_OFFSET_HOURS
}

fn default_start_time_scan_lines() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.ingest.civil_offset()?;
        Ok(config)
    }
}

/// Where a config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    CommandLine,
    Environment,
    Discovered,
}

/// Resolve the config file path by priority (CLI > env > user dir > system dir)
///
/// Explicit paths are returned whether or not they exist; discovered paths only
/// when they exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigOrigin)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigOrigin::CommandLine));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some((PathBuf::from(path), ConfigOrigin::Environment));
        }
    }

    // Priority 3 and 4: platform config locations
    default_config_candidates()
        .into_iter()
        .find(|p| p.exists())
        .map(|p| (p, ConfigOrigin::Discovered))
}

fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("danmu").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/danmu/config.toml"));
    }
    candidates
}

/// A loaded config and the file it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// `None` when no file was found and defaults apply
    pub source: Option<(PathBuf, ConfigOrigin)>,
}

impl LoadedConfig {
    /// Report where the configuration came from
    ///
    /// Config is loaded before the subscriber exists, so the binary calls this
    /// once tracing is up.
    pub fn log_source(&self) {
        match &self.source {
            Some((path, origin)) => {
                info!("Loaded configuration from {} ({:?})", path.display(), origin)
            }
            None => warn!("No config file found, using defaults"),
        }
    }
}

/// Load configuration, falling back to defaults when no file is found
pub fn load_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    match resolve_config_path(cli_arg) {
        Some((path, origin)) => {
            if origin != ConfigOrigin::Discovered && !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let config = TomlConfig::from_file(&path)?;
            Ok(LoadedConfig {
                config,
                source: Some((path, origin)),
            })
        }
        None => Ok(LoadedConfig {
            config: TomlConfig::default(),
            source: None,
        }),
    }
}
