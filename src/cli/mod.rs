//! Command-line interface for wattroll.
//!
//! Just run `wattroll` to start the rollup daemon with sensible defaults.
//! The other subcommands run the cycles once, feed samples into the raw
//! window, print a status report or flip maintenance mode.

use crate::core::{Config, ConfigBuilder, Result, RollupError, WindowKind};
use crate::metrics::MetricCatalog;
use crate::monitoring::HealthReport;
use crate::scheduler::{Clock, CycleScheduler, SystemClock};
use crate::storage::{MaintenanceFile, SampleStore, WindowStore};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

/// Rollup-and-retention engine for power telemetry windows
#[derive(Parser, Debug)]
#[command(name = "wattroll")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/wattroll/config.yaml)
    #[arg(short, long, env = "WATTROLL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the window files
    #[arg(long, env = "WATTROLL_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "WATTROLL_DEBUG", global = true)]
    pub debug: bool,

    /// Subcommand; `daemon` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll for due rollup cycles until interrupted (default)
    Daemon,
    /// Run the weekly, monthly and yearly cycles once and exit
    Once,
    /// Append newline-delimited JSON samples to the raw window
    Ingest {
        /// Read samples from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print a health report as JSON
    Status,
    /// Show or change maintenance mode
    Maintenance {
        /// What to do with the flag
        #[arg(value_enum, default_value_t = MaintenanceAction::Show)]
        action: MaintenanceAction,
    },
    /// Validate configuration and exit
    CheckConfig,
}

/// Maintenance subcommand actions
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Pause ingestion
    On,
    /// Resume ingestion
    Off,
    /// Flip the current state
    Toggle,
    /// Print the current state
    Show,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Subcommand to run; the daemon when none is given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            let default_path = dirs::config_dir()
                .map(|d| d.join("wattroll").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("~/.config/wattroll/config.yaml"));

            if default_path.exists() {
                default_path
            } else {
                return self.build_config_from_args(builder);
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
            },
            Err(e) if self.config.is_some() => {
                return Err(RollupError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
            Err(_) => {},
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir.clone());
        }
        builder.debug(self.debug).build()
    }

    /// Initialize logging.
    ///
    /// Level comes from `--debug`, then `WATTROLL_LOG_LEVEL`, then the config
    /// file; `RUST_LOG` overrides all of them. The daemon and
    /// `logging.structured` add targets, thread ids and line numbers.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("WATTROLL_LOG_LEVEL").ok();
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level
                .as_deref()
                .unwrap_or_else(|| config.logging.level.as_str())
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let structured = config.logging.structured || self.command() == Command::Daemon;
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(structured)
            .with_thread_ids(structured)
            .with_line_number(structured)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| RollupError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the selected command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;
    tracing::debug!(data_dir = %config.storage.data_dir.display(), "configuration loaded");

    match cli.command() {
        Command::CheckConfig => check_config(&config),
        Command::Daemon => run_daemon(&config).await,
        Command::Once => run_once(&config),
        Command::Ingest { file } => ingest(&config, file).await,
        Command::Status => status(&config),
        Command::Maintenance { action } => maintenance(&config, action),
    }
}

fn check_config(config: &Config) -> Result<()> {
    config.validate()?;
    println!("Configuration is valid!");
    println!("  Data directory: {}", config.storage.data_dir.display());
    for kind in WindowKind::ALL {
        let window = config.windows.get(kind);
        let schedule = match (window.granularity, window.run_at) {
            (Some(granularity), Some(run_at)) => {
                format!("{} buckets at {}", granularity, run_at.format("%H:%M"))
            },
            _ => "raw samples".to_string(),
        };
        println!(
            "  {:<8} {:<14} retention {:<12} {}",
            kind.to_string(),
            window.file,
            format!("{:?}", window.retention),
            schedule
        );
    }
    println!("  Poll interval: {:?}", config.scheduler.poll_interval);
    println!("  Maintenance state: {}", config.maintenance.state_file.display());
    Ok(())
}

fn open_store(config: &Config) -> Result<WindowStore> {
    WindowStore::open(&config.storage.data_dir, &config.windows)
}

async fn run_daemon(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let mut scheduler = CycleScheduler::new(config, store, Arc::new(SystemClock))?;

    tracing::info!(data_dir = %config.storage.data_dir.display(), "starting wattroll daemon");
    scheduler
        .run_daemon(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal, stopping...");
        })
        .await
}

fn run_once(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let mut scheduler = CycleScheduler::new(config, store, Arc::new(SystemClock))?;

    let reports = scheduler.run_once();
    for report in &reports {
        println!("{}", report);
    }

    let failed: Vec<String> = reports
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| r.window.to_string())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(RollupError::CycleFailed {
            window: failed.join(", "),
            reason: "see log for details".to_string(),
        })
    }
}

async fn ingest(config: &Config, file: Option<PathBuf>) -> Result<()> {
    let clock = SystemClock;
    let maintenance = MaintenanceFile::new(&config.maintenance.state_file);
    if maintenance.is_enabled() {
        tracing::info!("maintenance mode enabled, skipping ingestion");
        println!("Maintenance mode is on; no samples ingested.");
        return Ok(());
    }

    let text = match &file {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            RollupError::config(format!("Failed to read samples from {:?}: {}", path, e))
        })?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        },
    };

    let (inputs, malformed) = SampleStore::parse_ndjson(&text);
    for line in &malformed {
        tracing::warn!(line = line.index + 1, reason = %line.reason, "skipping malformed line");
    }

    let samples = SampleStore::new(
        open_store(config)?,
        config.windows.raw.retention_policy(),
        MetricCatalog::from_config(&config.metrics),
    );
    let mut report = samples.ingest_batch(&inputs, clock.now())?;
    report.rejected.extend(malformed);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let report = HealthReport::collect(config, &store, SystemClock.now());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn maintenance(config: &Config, action: MaintenanceAction) -> Result<()> {
    let file = MaintenanceFile::new(&config.maintenance.state_file);
    let now = SystemClock.now();

    let state = match action {
        MaintenanceAction::On => file.set(true, now)?,
        MaintenanceAction::Off => file.set(false, now)?,
        MaintenanceAction::Toggle => file.toggle(now)?,
        MaintenanceAction::Show => file.load(),
    };

    println!(
        "Maintenance mode: {}",
        if state.enabled { "ON" } else { "OFF" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["wattroll"]).unwrap();
        assert!(!cli.debug);
        assert!(cli.config.is_none());
        assert_eq!(cli.command(), Command::Daemon);
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["wattroll", "--data-dir", "/tmp/w", "once"]).unwrap();
        assert_eq!(cli.command(), Command::Once);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/w")));

        let cli = Cli::try_parse_from(["wattroll", "ingest", "--file", "samples.ndjson"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Ingest {
                file: Some(PathBuf::from("samples.ndjson"))
            }
        );

        let cli = Cli::try_parse_from(["wattroll", "maintenance", "toggle"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Maintenance {
                action: MaintenanceAction::Toggle
            }
        );

        let cli = Cli::try_parse_from(["wattroll", "maintenance"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Maintenance {
                action: MaintenanceAction::Show
            }
        );

        assert!(Cli::try_parse_from(["wattroll", "maintenance", "maybe"]).is_err());
    }

    #[tokio::test]
    async fn test_explicit_missing_config_is_an_error() {
        let cli = Cli::try_parse_from(["wattroll", "--config", "/nonexistent/wattroll.yaml", "status"])
            .unwrap();
        let err = cli.load_config().await.unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[tokio::test]
    async fn test_data_dir_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "storage:\n  data_dir: /from/file\n").unwrap();

        let cli = Cli::try_parse_from([
            "wattroll",
            "--config",
            path.to_str().unwrap(),
            "--data-dir",
            "/from/cli",
            "check-config",
        ])
        .unwrap();
        let config = cli.load_config().await.unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/from/cli"));
    }
}
