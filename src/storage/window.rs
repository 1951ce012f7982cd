//! Windows and the window merger.
//!
//! A [`Window`] keeps its points strictly ascending by timestamp with no
//! duplicates. [`Window::merge`] is the only mutation path used by cycles and
//! by the sample store, so every write goes through the same dedupe and
//! retention rules.

use crate::core::types::optional_timestamp_format;
use crate::core::DataPoint;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Time and count limits for one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// Points older than `now - max_age` are dropped
    pub max_age: Duration,
    /// Optional hard ceiling; oldest points go first
    pub max_points: Option<usize>,
}

impl Retention {
    /// Create a retention policy.
    pub fn new(max_age: Duration, max_points: Option<usize>) -> Self {
        Self {
            max_age,
            max_points,
        }
    }

    /// Oldest timestamp still retained at `now`.
    ///
    /// `None` when the age limit reaches past the representable range, in
    /// which case only the point ceiling applies.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        TimeDelta::from_std(self.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
    }

    /// Trim an ascending point list in place. Returns how many were dropped.
    pub fn apply(&self, points: &mut Vec<DataPoint>, now: DateTime<Utc>) -> usize {
        let before = points.len();

        if let Some(cutoff) = self.cutoff(now) {
            let expired = points.partition_point(|p| p.timestamp < cutoff);
            points.drain(..expired);
        }
        if let Some(max) = self.max_points {
            if points.len() > max {
                let excess = points.len() - max;
                points.drain(..excess);
            }
        }

        before - points.len()
    }
}

/// A retention-bounded, time-ordered series as stored in one file.
///
/// Serializes to exactly `{"data_points": [...], "last_update": "...Z" | null}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Window {
    /// Points, strictly ascending by timestamp
    pub data_points: Vec<DataPoint>,
    /// Time of the last successful write
    #[serde(with = "optional_timestamp_format")]
    pub last_update: Option<DateTime<Utc>>,
}

impl Window {
    /// An empty, never-written window.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a window from points in any order.
    ///
    /// Points are sorted and deduplicated; for equal timestamps the one that
    /// appears last wins.
    pub fn from_points(
        points: impl IntoIterator<Item = DataPoint>,
        last_update: Option<DateTime<Utc>>,
    ) -> Self {
        let by_timestamp: BTreeMap<DateTime<Utc>, DataPoint> =
            points.into_iter().map(|p| (p.timestamp, p)).collect();
        Self {
            data_points: by_timestamp.into_values().collect(),
            last_update,
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    /// True when the window holds no points.
    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    /// Oldest point.
    pub fn oldest(&self) -> Option<&DataPoint> {
        self.data_points.first()
    }

    /// Newest point.
    pub fn newest(&self) -> Option<&DataPoint> {
        self.data_points.last()
    }

    /// Point at an exact timestamp.
    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<&DataPoint> {
        self.data_points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|idx| &self.data_points[idx])
    }

    /// True when timestamps are strictly ascending.
    pub fn is_strictly_ascending(&self) -> bool {
        self.data_points
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }

    /// Fold `new_points` into this window.
    ///
    /// 1. concatenate existing and new points
    /// 2. dedupe by timestamp, later (new) points win
    /// 3. sort ascending
    /// 4. drop points older than `now - retention.max_age`, then the oldest
    ///    excess beyond `retention.max_points`
    /// 5. stamp `last_update` (never moves backwards)
    ///
    /// Re-merging the same points at the same `now` yields the same window.
    pub fn merge(&self, new_points: &[DataPoint], retention: &Retention, now: DateTime<Utc>) -> Window {
        let mut merged = Window::from_points(
            self.data_points.iter().chain(new_points).cloned(),
            None,
        );

        let dropped = retention.apply(&mut merged.data_points, now);
        if dropped > 0 {
            tracing::debug!(dropped, kept = merged.len(), "trimmed window to retention");
        }

        merged.last_update = Some(self.last_update.map_or(now, |prev| prev.max(now)));
        merged
    }
}
