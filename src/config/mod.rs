//! Configuration management for harvest
//!
//! Handles loading and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::RecordType;
use crate::schedule::{ScheduleMode, ScheduleSpec};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Query substituted into every source's endpoint or URL pattern
    #[serde(default)]
    pub query: Option<String>,

    /// Configured origins, fetched in order each cycle
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Cycle cadence
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Relational store settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Flat-file output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// HTTP and robots.txt settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Log destination and level
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// One configured origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used as the origin tag on every record
    pub name: String,

    /// Per-source CSV path (defaults to `<output.dir>/<name>.csv`)
    #[serde(default)]
    pub output: Option<PathBuf>,

    #[serde(flatten)]
    pub kind: SourceKind,
}

/// The two kinds of origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON API queried with an optional query parameter
    Api {
        endpoint: String,
        #[serde(default)]
        query_param: Option<String>,
        #[serde(default)]
        mapping: Option<FieldMapping>,
    },
    /// HTML page built from a `{query}` URL pattern
    Document {
        url_pattern: String,
        #[serde(default = "default_capture_metadata")]
        capture_metadata: bool,
    },
}

/// How API payload fields map onto records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// JSON pointer to the array to flatten (e.g. `/results`); root if unset
    #[serde(default)]
    pub items: Option<String>,

    /// Field holding the record text
    pub text: String,

    /// Field holding the record type label
    #[serde(default)]
    pub type_field: Option<String>,

    /// Fixed record type when `type_field` is unset or unrecognized
    #[serde(default)]
    pub record_type: Option<String>,
}

/// Schedule section as written in the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// `once`, `interval` or `daily`
    #[serde(default)]
    pub mode: Option<ScheduleMode>,

    /// Seconds between cycle starts for `interval`
    #[serde(default)]
    pub interval_secs: Option<u64>,

    /// Stop after this many cycles
    #[serde(default)]
    pub max_iterations: Option<u64>,

    /// Run time for `daily`, `HH:MM` UTC
    #[serde(default)]
    pub daily_at: Option<String>,

    /// Shorthand: `"daily"`, `"none"` or a number of seconds
    #[serde(default)]
    pub every: Option<String>,
}

/// Relational store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Table receiving records
    #[serde(default = "default_table_name")]
    pub table: String,

    /// How long a locked database is retried before failing
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

/// Flat-file output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for per-source CSV snapshots
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Write `origin_tag` and `source_url` columns
    #[serde(default = "default_include_origin")]
    pub include_origin: bool,

    /// Suffix file names with the cycle timestamp instead of overwriting
    #[serde(default)]
    pub versioned: bool,
}

/// HTTP fetch and robots.txt configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// robots.txt request timeout in seconds
    #[serde(default = "default_robots_timeout")]
    pub robots_timeout_secs: u64,

    /// Whether to respect robots.txt
    #[serde(default = "default_respect_robots")]
    pub respect_robots_txt: bool,

    /// Agent name evaluated against robots.txt groups
    #[serde(default = "default_robots_agent")]
    pub robots_agent: String,

    /// Cache robots.txt per origin for this long (0 disables)
    #[serde(default)]
    pub robots_cache_ttl_secs: u64,

    /// Allow fetching when robots.txt cannot be retrieved
    #[serde(default)]
    pub robots_fail_open: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Also append logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            table: default_table_name(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            include_origin: default_include_origin(),
            versioned: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_fetch_timeout(),
            robots_timeout_secs: default_robots_timeout(),
            respect_robots_txt: default_respect_robots(),
            robots_agent: default_robots_agent(),
            robots_cache_ttl_secs: 0,
            robots_fail_open: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

impl SourceConfig {
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            SourceKind::Api { .. } => "api",
            SourceKind::Document { .. } => "document",
        }
    }
}

impl ScheduleConfig {
    /// Resolve the written schedule into a validated [`ScheduleSpec`]
    pub fn to_spec(&self) -> Result<ScheduleSpec> {
        let (mode, interval_secs) = match (&self.mode, &self.every) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "schedule.mode and schedule.every are mutually exclusive".to_string(),
                ))
            }
            (Some(mode), None) => (*mode, self.interval_secs),
            (None, Some(every)) => parse_every(every)?,
            (None, None) => (ScheduleMode::Once, None),
        };

        let daily_at = match &self.daily_at {
            Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
                Error::Config(format!("schedule.daily_at must be HH:MM, got '{}'", s))
            })?,
            None => NaiveTime::parse_from_str(&default_daily_at(), "%H:%M")
                .map_err(|e| Error::Config(e.to_string()))?,
        };

        ScheduleSpec::new(mode, interval_secs, self.max_iterations, daily_at)
    }
}

fn parse_every(every: &str) -> Result<(ScheduleMode, Option<u64>)> {
    match every.trim().to_lowercase().as_str() {
        "daily" => Ok((ScheduleMode::Daily, None)),
        "none" | "" => Ok((ScheduleMode::Once, None)),
        secs => secs
            .parse::<u64>()
            .map(|n| (ScheduleMode::Interval, Some(n)))
            .map_err(|_| {
                Error::Config(format!(
                    "schedule.every must be 'daily', 'none' or seconds, got '{}'",
                    every
                ))
            }),
    }
}

impl Config {
    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_toml(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve a configured path against the config file's directory
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.base_dir.join(path)
        }
    }

    /// Absolute database file path
    pub fn db_path(&self) -> PathBuf {
        self.resolve_path(&self.database.path)
    }

    /// CSV path for a source
    pub fn csv_path(&self, source: &SourceConfig) -> PathBuf {
        match &source.output {
            Some(path) => self.resolve_path(path),
            None => self
                .resolve_path(&self.output.dir)
                .join(format!("{}.csv", sanitize_file_stem(&source.name))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::Config("at least one [[sources]] entry is required".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(Error::Config("source name must not be empty".to_string()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(Error::Config(format!("duplicate source name '{}'", source.name)));
            }
            match &source.kind {
                SourceKind::Api {
                    endpoint, mapping, ..
                } => {
                    if endpoint.trim().is_empty() {
                        return Err(Error::Config(format!(
                            "source '{}': endpoint must not be empty",
                            source.name
                        )));
                    }
                    if let Some(mapping) = mapping {
                        if mapping.text.trim().is_empty() {
                            return Err(Error::Config(format!(
                                "source '{}': mapping.text must name a field",
                                source.name
                            )));
                        }
                        if let Some(items) = &mapping.items {
                            if !items.is_empty() && !items.starts_with('/') {
                                return Err(Error::Config(format!(
                                    "source '{}': mapping.items must be a JSON pointer like '/results'",
                                    source.name
                                )));
                            }
                        }
                        if let Some(record_type) = &mapping.record_type {
                            record_type.parse::<RecordType>().map_err(|_| {
                                Error::Config(format!(
                                    "source '{}': unknown mapping.record_type '{}'",
                                    source.name, record_type
                                ))
                            })?;
                        }
                    }
                }
                SourceKind::Document { url_pattern, .. } => {
                    if url_pattern.trim().is_empty() {
                        return Err(Error::Config(format!(
                            "source '{}': url_pattern must not be empty",
                            source.name
                        )));
                    }
                }
            }
        }

        self.schedule.to_spec()?;

        if !is_valid_identifier(&self.database.table) {
            return Err(Error::Config(format!(
                "database.table '{}' must be a plain SQL identifier",
                self.database.table
            )));
        }

        if self.fetch.timeout_secs == 0 || self.fetch.robots_timeout_secs == 0 {
            return Err(Error::Config(
                "fetch.timeout_secs and fetch.robots_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check that a name is safe to splice into DDL
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
