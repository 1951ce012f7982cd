//! Configuration management for wattroll.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable overrides (through the CLI)
//! - CLI argument overrides
//! - Validation and defaults
//!
//! The resulting [`Config`] is an ordinary value handed to each component
//! when it is constructed; nothing reads configuration from global state.

use crate::core::{Result, RollupError, WindowKind};
use crate::metrics::{Granularity, ReductionKind};
use crate::storage::Retention;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

/// Complete configuration for wattroll
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration
    pub storage: StorageConfig,
    /// Per-window configuration
    pub windows: WindowsConfig,
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
    /// Metric reduction configuration
    pub metrics: MetricsConfig,
    /// Maintenance mode configuration
    pub maintenance: MaintenanceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding every window file
    pub data_dir: PathBuf,
    /// Expected interval between collector samples
    #[serde(with = "humantime_serde")]
    pub collection_interval: Duration,
}

/// Configuration for each of the four windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsConfig {
    /// Raw sample window
    pub raw: WindowConfig,
    /// Hourly rollups over a week
    pub weekly: WindowConfig,
    /// Daily rollups over a month
    pub monthly: WindowConfig,
    /// Daily rollups over a year
    pub yearly: WindowConfig,
}

/// Configuration for a single window file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// File name inside the data directory
    pub file: String,
    /// How far back points are kept
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    /// Optional hard ceiling on point count
    #[serde(default)]
    pub max_points: Option<usize>,
    /// Bucket width for rollups (absent for the raw window)
    #[serde(default)]
    pub granularity: Option<Granularity>,
    /// Local time of day at which the rollup cycle becomes due
    #[serde(default, with = "optional_clock_time")]
    pub run_at: Option<NaiveTime>,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the daemon checks for due cycles
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

/// Metric reduction configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Per-metric reduction overrides on top of the built-in table
    pub reductions: BTreeMap<String, ReductionKind>,
    /// Additional metrics clamped to zero or above
    pub non_negative: Vec<String>,
}

/// Maintenance mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Location of the maintenance state record
    pub state_file: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Diagnostics
    Debug,
    /// Normal operation
    Info,
    /// Recoverable problems
    Warn,
    /// Failures only
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            windows: WindowsConfig::default(),
            scheduler: SchedulerConfig::default(),
            metrics: MetricsConfig::default(),
            maintenance: MaintenanceConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("./wattroll_data"),
            collection_interval: Duration::from_secs(10 * 60),
        }
    }
}

impl Default for WindowsConfig {
    fn default() -> Self {
        WindowsConfig {
            raw: WindowConfig {
                file: "daily.json".to_string(),
                retention: Duration::from_secs(DAY),
                max_points: None,
                granularity: None,
                run_at: None,
            },
            weekly: WindowConfig::rollup("weekly.json", 7, Granularity::Hourly, (0, 2)),
            monthly: WindowConfig::rollup("monthly.json", 30, Granularity::Daily, (0, 5)),
            yearly: WindowConfig::rollup("yearly.json", 365, Granularity::Daily, (0, 15)),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        MaintenanceConfig {
            state_file: PathBuf::from("./wattroll_state/maintenance.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl WindowConfig {
    fn rollup(file: &str, days: u64, granularity: Granularity, run_at: (u32, u32)) -> Self {
        WindowConfig {
            file: file.to_string(),
            retention: Duration::from_secs(days * DAY),
            max_points: None,
            granularity: Some(granularity),
            run_at: NaiveTime::from_hms_opt(run_at.0, run_at.1, 0),
        }
    }

    /// Retention policy enforced on every write of this window.
    pub fn retention_policy(&self) -> Retention {
        Retention::new(self.retention, self.max_points)
    }
}

impl WindowsConfig {
    /// Configuration for the given window.
    pub fn get(&self, kind: WindowKind) -> &WindowConfig {
        match kind {
            WindowKind::Raw => &self.raw,
            WindowKind::Weekly => &self.weekly,
            WindowKind::Monthly => &self.monthly,
            WindowKind::Yearly => &self.yearly,
        }
    }

    /// Mutable configuration for the given window.
    pub fn get_mut(&mut self, kind: WindowKind) -> &mut WindowConfig {
        match kind {
            WindowKind::Raw => &mut self.raw,
            WindowKind::Weekly => &mut self.weekly,
            WindowKind::Monthly => &mut self.monthly,
            WindowKind::Yearly => &mut self.yearly,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(RollupError::config("storage.data_dir must not be empty"));
        }

        if self.scheduler.poll_interval.is_zero() {
            return Err(RollupError::config("scheduler.poll_interval must be greater than 0"));
        }

        let mut files = BTreeSet::new();
        for kind in WindowKind::ALL {
            let window = self.windows.get(kind);

            if window.file.trim().is_empty() || window.file.contains(['/', '\\']) {
                return Err(RollupError::config(format!(
                    "windows.{}.file must be a plain file name, got '{}'",
                    kind, window.file
                )));
            }
            if !files.insert(window.file.as_str()) {
                return Err(RollupError::config(format!(
                    "windows.{}.file '{}' is used by more than one window",
                    kind, window.file
                )));
            }
            if window.retention.is_zero() {
                return Err(RollupError::config(format!(
                    "windows.{}.retention must be greater than 0",
                    kind
                )));
            }
            if window.max_points == Some(0) {
                return Err(RollupError::config(format!(
                    "windows.{}.max_points must be greater than 0",
                    kind
                )));
            }

            match (kind, window.granularity, window.run_at) {
                (WindowKind::Raw, None, None) => {},
                (WindowKind::Raw, _, _) => {
                    return Err(RollupError::config(
                        "windows.raw takes neither a granularity nor a run_at time",
                    ));
                },
                (_, Some(_), Some(_)) => {},
                (_, _, _) => {
                    return Err(RollupError::config(format!(
                        "windows.{} needs both a granularity and a run_at time",
                        kind
                    )));
                },
            }
        }

        if self.maintenance.state_file.as_os_str().is_empty() {
            return Err(RollupError::config("maintenance.state_file must not be empty"));
        }

        Ok(())
    }

    /// Full path of a window file.
    pub fn window_path(&self, kind: WindowKind) -> PathBuf {
        self.storage.data_dir.join(&self.windows.get(kind).file)
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| RollupError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set data directory
    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.config.storage.data_dir = path;
        self
    }

    /// Set maintenance state file
    pub fn state_file(mut self, path: PathBuf) -> Self {
        self.config.maintenance.state_file = path;
        self
    }

    /// Set retention for a window
    pub fn retention(mut self, kind: WindowKind, retention: Duration) -> Self {
        self.config.windows.get_mut(kind).retention = retention;
        self
    }

    /// Set the hard point ceiling for a window
    pub fn max_points(mut self, kind: WindowKind, max_points: Option<usize>) -> Self {
        self.config.windows.get_mut(kind).max_points = max_points;
        self
    }

    /// Set the daily run time for a rollup window
    pub fn run_at(mut self, kind: WindowKind, run_at: NaiveTime) -> Self {
        self.config.windows.get_mut(kind).run_at = Some(run_at);
        self
    }

    /// Set scheduler poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.scheduler.poll_interval = interval;
        self
    }

    /// Override the reduction kind of a metric
    pub fn reduction(mut self, metric: &str, kind: ReductionKind) -> Self {
        self.config.metrics.reductions.insert(metric.to_string(), kind);
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Serde adapter for `HH:MM` schedule offsets (seconds optional on input).
pub mod optional_clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `HH:MM`.
    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize `HH:MM` or `HH:MM:SS`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<NaiveTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid time of day '{}': {}", raw, e)))
    }
}
