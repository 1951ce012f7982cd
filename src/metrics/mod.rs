//! Metric reduction rules and the bucketizer.
//!
//! - [`MetricCatalog`]: static name → reduction table (mean or max)
//! - [`Bucketizer`]: groups points into hourly or daily UTC buckets

pub mod aggregator;
pub mod types;

pub use aggregator::{Bucketizer, Granularity};
pub use types::{MetricCatalog, MetricSpec, ReductionKind};
