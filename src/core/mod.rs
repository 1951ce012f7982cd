//! Core domain models, configuration and errors for wattroll.
//!
//! This module contains the fundamental types shared by the sample store,
//! the rollup machinery and the scheduler.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, WindowConfig, WindowsConfig};
pub use error::{Result, RollupError};
pub use types::{
    format_timestamp, parse_timestamp, round2, AggregatePoint, DataPoint, MetricMap, Sample,
    SampleInput, WindowKind, VALUE_METRIC,
};
