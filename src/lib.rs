//! wattroll - rollup-and-retention engine for power telemetry.
//!
//! A collector appends samples to a short raw window. Once a day, shortly
//! after local midnight, wattroll folds the raw window into three longer
//! windows of hourly and daily aggregates, each trimmed to its own retention.
//! Every window is a plain JSON file that dashboards read directly.
//!
//! # Features
//!
//! - **Four windows**: raw (24h), weekly/hourly (7d), monthly/daily (30d), yearly/daily (365d)
//! - **Per-metric reductions**: mean for power-like metrics, max for daily counters
//! - **Idempotent merges**: re-running a cycle never duplicates points
//! - **Crash-safe writes**: temp file + fsync + atomic rename
//! - **Zero configuration**: works out of the box with sensible defaults
//!
//! # Architecture
//!
//! - `core`: domain types, configuration and errors
//! - `metrics`: reduction table and bucketizer
//! - `storage`: window merge, persistence, sample ingestion, maintenance flag
//! - `scheduler`: clock seam and the daily cycle scheduler
//! - `monitoring`: health report
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wattroll_lib::core::Config;
//! use wattroll_lib::scheduler::{CycleScheduler, SystemClock};
//! use wattroll_lib::storage::WindowStore;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = WindowStore::open(&config.storage.data_dir, &config.windows)?;
//!     let mut scheduler = CycleScheduler::new(&config, store, Arc::new(SystemClock))?;
//!     for report in scheduler.run_once() {
//!         println!("{}", report);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod metrics;
pub mod monitoring;
pub mod scheduler;
pub mod storage;

// Re-export core types for convenience
pub use crate::core::{Config, Result, RollupError};
