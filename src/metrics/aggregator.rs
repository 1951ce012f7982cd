//! Bucketizer: reduces points into hourly or daily aggregates.
//!
//! Grouping is a pure function of the UTC bucket start, so the same input
//! always lands in the same buckets regardless of the host time zone.

use crate::core::{round2, AggregatePoint, DataPoint};
use crate::metrics::types::{MetricCatalog, ReductionKind};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Buckets start on the hour (UTC)
    Hourly,
    /// Buckets start at UTC midnight
    Daily,
}

impl Granularity {
    /// Bucket width in seconds.
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::Hourly => 3600,
            Self::Daily => 86_400,
        }
    }

    /// Bucket width.
    pub fn width(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }

    /// Start of the bucket containing `timestamp` (the bucket key).
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let secs = timestamp.timestamp();
        let start = secs - secs.rem_euclid(self.seconds());
        DateTime::from_timestamp(start, 0).unwrap_or(timestamp)
    }

    /// Exclusive end of the bucket containing `timestamp`.
    pub fn bucket_end(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        self.bucket_start(timestamp) + self.width()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly => f.write_str("hourly"),
            Self::Daily => f.write_str("daily"),
        }
    }
}

/// Running reduction state for one metric in one bucket
#[derive(Debug, Clone, Copy)]
struct MetricAccumulator {
    sum: f64,
    count: u32,
    max: f64,
}

impl MetricAccumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.max = self.max.max(value);
    }

    fn finish(&self, kind: ReductionKind) -> f64 {
        match kind {
            ReductionKind::Mean => self.sum / f64::from(self.count.max(1)),
            ReductionKind::Max => self.max,
        }
    }
}

/// Unit agreement across a bucket's members
#[derive(Debug, Clone, Default)]
enum UnitTag {
    #[default]
    Unset,
    Agreed(String),
    Mixed,
}

impl UnitTag {
    fn observe(&mut self, unit: Option<&str>) {
        let Some(unit) = unit else { return };
        match self {
            Self::Unset => *self = Self::Agreed(unit.to_string()),
            Self::Agreed(current) if current != unit => *self = Self::Mixed,
            _ => {},
        }
    }

    fn into_unit(self) -> Option<String> {
        match self {
            Self::Agreed(unit) => Some(unit),
            Self::Unset | Self::Mixed => None,
        }
    }
}

#[derive(Debug, Default)]
struct Bucket {
    metrics: BTreeMap<String, MetricAccumulator>,
    unit: UnitTag,
}

/// Reduces points into aggregates using a [`MetricCatalog`].
#[derive(Debug, Clone, Default)]
pub struct Bucketizer {
    catalog: MetricCatalog,
}

impl Bucketizer {
    /// Create a bucketizer with the given reduction table.
    pub fn new(catalog: MetricCatalog) -> Self {
        Self { catalog }
    }

    /// The reduction table in use.
    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Group `points` by bucket key and reduce each group.
    ///
    /// Returns one point per distinct bucket, ascending. Each metric present
    /// in at least one member is reduced over the members that carry it, and
    /// every emitted value is rounded to two decimals. Empty in, empty out.
    pub fn aggregate(&self, points: &[DataPoint], granularity: Granularity) -> Vec<AggregatePoint> {
        let mut buckets: BTreeMap<DateTime<Utc>, Bucket> = BTreeMap::new();

        for point in points {
            let bucket = buckets
                .entry(granularity.bucket_start(point.timestamp))
                .or_default();
            bucket.unit.observe(point.unit.as_deref());
            for (name, value) in &point.metrics {
                bucket
                    .metrics
                    .entry(name.clone())
                    .or_insert_with(MetricAccumulator::new)
                    .add(*value);
            }
        }

        buckets
            .into_iter()
            .map(|(start, bucket)| {
                let mut aggregate = DataPoint::new(start);
                aggregate.unit = bucket.unit.into_unit();
                for (name, acc) in bucket.metrics {
                    let value = acc.finish(self.catalog.reduction(&name));
                    aggregate.metrics.insert(name, round2(value));
                }
                aggregate
            })
            .collect()
    }
}
