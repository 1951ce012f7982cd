//! Metric reduction table.
//!
//! How a metric collapses inside a bucket is looked up by name, never
//! inferred from the data.

use crate::core::config::MetricsConfig;
use crate::core::{round2, DataPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How samples of one metric reduce inside a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionKind {
    /// Arithmetic mean (power, voltage, ...)
    #[default]
    Mean,
    /// Maximum in bucket, for counters that only grow within a day
    Max,
}

/// Per-metric rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricSpec {
    /// Bucket reduction
    pub reduction: ReductionKind,
    /// Physical power/energy quantity, clamped to zero or above
    pub non_negative: bool,
}

impl MetricSpec {
    const fn mean(non_negative: bool) -> Self {
        Self {
            reduction: ReductionKind::Mean,
            non_negative,
        }
    }

    const fn max(non_negative: bool) -> Self {
        Self {
            reduction: ReductionKind::Max,
            non_negative,
        }
    }
}

/// Built-in table for the power-monitor metric set.
const BUILTIN: [(&str, MetricSpec); 7] = [
    ("value", MetricSpec::mean(true)),
    ("power", MetricSpec::mean(true)),
    ("solar", MetricSpec::mean(true)),
    ("voltage", MetricSpec::mean(false)),
    ("power_factor", MetricSpec::mean(false)),
    ("daily_energy", MetricSpec::max(true)),
    ("energy", MetricSpec::max(true)),
];

/// Lookup table from metric name to [`MetricSpec`].
///
/// Unknown metrics reduce by mean and are not clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCatalog {
    specs: BTreeMap<String, MetricSpec>,
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MetricCatalog {
    /// The built-in table only.
    pub fn builtin() -> Self {
        Self {
            specs: BUILTIN
                .iter()
                .map(|(name, spec)| ((*name).to_string(), *spec))
                .collect(),
        }
    }

    /// Built-in table with the configured overrides applied.
    pub fn from_config(config: &MetricsConfig) -> Self {
        let mut catalog = Self::builtin();
        for (name, kind) in &config.reductions {
            catalog.specs.entry(name.clone()).or_default().reduction = *kind;
        }
        for name in &config.non_negative {
            catalog.specs.entry(name.clone()).or_default().non_negative = true;
        }
        catalog
    }

    /// Rules for a metric.
    pub fn spec(&self, metric: &str) -> MetricSpec {
        self.specs.get(metric).copied().unwrap_or_default()
    }

    /// Reduction kind for a metric.
    pub fn reduction(&self, metric: &str) -> ReductionKind {
        self.spec(metric).reduction
    }

    /// Clamp (when physical) and round a single value.
    pub fn normalize(&self, metric: &str, value: f64) -> f64 {
        let value = if self.spec(metric).non_negative {
            value.max(0.0)
        } else {
            value
        };
        round2(value)
    }

    /// Normalize every metric of a point in place.
    pub fn normalize_point(&self, point: &mut DataPoint) {
        for (name, value) in point.metrics.iter_mut() {
            *value = self.normalize(name, *value);
        }
    }
}
