//! Core domain types for telemetry windows.
//!
//! Every window (raw samples and rolled-up aggregates alike) stores the same
//! point shape: a UTC timestamp plus a set of named metrics. The single-metric
//! collector variant is just a point whose only metric is [`VALUE_METRIC`]
//! with a `unit` tag.

use crate::core::{Result, RollupError};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named metric values carried by a point, ordered by name.
pub type MetricMap = BTreeMap<String, f64>;

/// Metric key used by single-metric collectors.
pub const VALUE_METRIC: &str = "value";

/// Keys that belong to the point envelope and can never be metric names.
const RESERVED_KEYS: [&str; 2] = ["timestamp", "unit"];

/// Naive formats accepted when a timestamp carries no offset (taken as UTC).
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// One timestamped observation or aggregate.
///
/// Serialized flat, e.g. `{"timestamp": "2024-01-01T00:10:00Z", "value": 150.0, "unit": "W"}`
/// or `{"timestamp": "...", "power": 312.5, "voltage": 231.2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Second-precision UTC instant (bucket start for aggregates)
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    /// Metric name to value
    #[serde(flatten)]
    pub metrics: MetricMap,
    /// Unit tag for single-metric series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A raw observation as stored in the raw window.
pub type Sample = DataPoint;

/// A bucketed reduction of samples.
pub type AggregatePoint = DataPoint;

impl DataPoint {
    /// Create a point with no metrics yet.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            metrics: MetricMap::new(),
            unit: None,
        }
    }

    /// Create a single-metric point (`value` + `unit`).
    pub fn single(timestamp: DateTime<Utc>, value: f64, unit: impl Into<String>) -> Self {
        Self::new(timestamp)
            .with_metric(VALUE_METRIC, value)
            .with_unit(unit)
    }

    /// Builder-style metric insertion.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Builder-style unit tag.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Look up a metric by name.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Shorthand for the single-metric `value`.
    pub fn value(&self) -> Option<f64> {
        self.metric(VALUE_METRIC)
    }
}

/// Unparsed sample as handed over by a collector (one NDJSON line).
///
/// Kept loose on purpose so a bad timestamp or field rejects just this
/// sample instead of the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    /// Timestamp as received
    pub timestamp: String,
    /// Optional unit tag
    #[serde(default)]
    pub unit: Option<String>,
    /// Everything else; must be numeric (or a numeric string)
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl SampleInput {
    /// Build a single-metric input.
    pub fn single(timestamp: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(VALUE_METRIC.to_string(), serde_json::Value::from(value));
        Self {
            timestamp: timestamp.into(),
            unit: Some(unit.into()),
            fields,
        }
    }

    /// Parse the timestamp and metric fields into a [`DataPoint`].
    pub fn parse(&self) -> Result<DataPoint> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        let mut point = DataPoint::new(timestamp);
        point.unit = self.unit.clone();

        for (name, raw) in &self.fields {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            let value = match raw {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                RollupError::invalid_sample(format!("metric '{}' is not a finite number: {}", name, raw))
            })?;
            point.metrics.insert(name.clone(), value);
        }

        if point.metrics.is_empty() {
            return Err(RollupError::invalid_sample(format!(
                "sample at {} carries no metrics",
                self.timestamp
            )));
        }
        Ok(point)
    }
}

/// The four windows maintained by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Raw samples, shortest retention
    Raw,
    /// Hourly aggregates over a week
    Weekly,
    /// Daily aggregates over a month
    Monthly,
    /// Daily aggregates over a year
    Yearly,
}

impl WindowKind {
    /// Every window, raw first.
    pub const ALL: [WindowKind; 4] = [Self::Raw, Self::Weekly, Self::Monthly, Self::Yearly];

    /// Windows fed by rollup cycles, in schedule order.
    pub const DOWNSTREAM: [WindowKind; 3] = [Self::Weekly, Self::Monthly, Self::Yearly];

    /// Lowercase name used in logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse an ISO-8601 timestamp into a second-precision UTC instant.
///
/// Accepts RFC 3339 with `Z` or an explicit offset, or a naive value which is
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc).trunc_subsecs(0));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc().trunc_subsecs(0))
        .ok_or_else(|| RollupError::invalid_timestamp(raw, "expected ISO-8601 date-time"))
}

/// Format a timestamp the way every window file stores it (`...T..:..:..Z`).
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serde adapter for the `Z`-suffixed timestamp wire format.
pub mod timestamp_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn serialize<S: Serializer>(
        timestamp: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(timestamp))
    }

    /// Deserialize leniently (see [`parse_timestamp`]).
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Same as [`timestamp_format`] but `null` maps to `None`.
pub mod optional_timestamp_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize `None` as `null`.
    pub fn serialize<S: Serializer>(
        timestamp: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match timestamp {
            Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize `null` or a timestamp string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_timestamp(&raw).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
