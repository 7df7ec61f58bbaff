//! Service configuration.
//!
//! Settings come from a TOML file (default `config/aqmon.toml`); every
//! section is optional and falls back to built-in defaults. Secrets may be
//! set in the file, but the environment (seeded from `.env` by the binary)
//! wins whenever it has a non-empty value:
//!
//! - `DATABASE_URL`: PostgreSQL connection string (overrides `database.url`)
//! - `SLACK_WEBHOOK_URL`: alert webhook (overrides `notifier.webhook_url`)
//! - `AIR_API_KEY`: data portal service key for `collect`

use crate::alert::AlertPolicy;
use crate::db::DEFAULT_TABLE;
use crate::grades::{GradePolicy, PolicyError};
use crate::ingest::airkorea::CollectorSettings;
use crate::ingest::store::RAW_PREFIX;
use crate::model::DISTRICT_SUFFIX;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/aqmon.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path} is not valid TOML: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_snapshot_prefix")]
    pub prefix: String,
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("data/snapshots")
}

fn default_snapshot_prefix() -> String {
    RAW_PREFIX.to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { dir: default_snapshot_dir(), prefix: default_snapshot_prefix() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    /// Skip rows already stored for the same `(dataTime, stationName)`.
    #[serde(default)]
    pub idempotent: bool,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, table: default_table(), idempotent: false }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { webhook_url: None, timeout_secs: default_notify_timeout() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default = "default_district_suffix")]
    pub district_suffix: char,
}

fn default_district_suffix() -> char {
    DISTRICT_SUFFIX
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { district_suffix: DISTRICT_SUFFIX }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub alert: AlertPolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Versioned grade policy; the built-in tables when unset.
    #[serde(default)]
    pub grades_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source })
    }

    /// Reads `path`. A missing file yields the defaults; an unreadable or
    /// invalid one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path: path.to_path_buf(), source }),
        }
    }

    /// Applies secret overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from any variable lookup (the environment in
    /// production, a map in tests). Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(url) = get("SLACK_WEBHOOK_URL") {
            self.notifier.webhook_url = Some(url);
        }
        self
    }

    /// Resolves the grade policy: the configured file, else the standard tables.
    pub fn grade_policy(&self) -> Result<GradePolicy, ConfigError> {
        match &self.grades_file {
            Some(path) => Ok(GradePolicy::from_file(path)?),
            None => Ok(GradePolicy::STANDARD),
        }
    }
}

/// The data portal key, if set.
pub fn api_key_from_env() -> Option<String> {
    std::env::var("AIR_API_KEY").ok().filter(|v| !v.trim().is_empty())
}
