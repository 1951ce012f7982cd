//! Health and status reporting for wattroll.
//!
//! A [`HealthReport`] is a read-only snapshot of the data directory: how full
//! each window is, summary statistics per metric, whether the collector is
//! keeping up, and whether maintenance mode is on. Building one never writes.

use crate::core::types::optional_timestamp_format;
use crate::core::{round2, Config, DataPoint, WindowKind};
use crate::storage::{MaintenanceFile, Window, WindowStore};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Overall health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    /// Collector is current and ingestion is active.
    Healthy,
    /// Ingestion paused or collector behind schedule.
    Degraded,
    /// Raw window has never been written.
    Unhealthy,
}

impl SystemHealth {
    /// Get severity score (0-100).
    pub fn severity(&self) -> u8 {
        match self {
            SystemHealth::Healthy => 0,
            SystemHealth::Degraded => 50,
            SystemHealth::Unhealthy => 100,
        }
    }
}

/// Summary of one metric across a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    /// Newest value
    pub current: f64,
    /// Mean over the window
    pub average: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Points carrying this metric
    pub samples: usize,
}

impl MetricSummary {
    /// Summarize `metric` over points in time order. `None` if no point has it.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DataPoint>, metric: &str) -> Option<Self> {
        let mut summary: Option<Self> = None;
        let mut sum = 0.0;

        for value in points.into_iter().filter_map(|p| p.metric(metric)) {
            sum += value;
            summary = Some(match summary {
                None => Self {
                    current: value,
                    average: value,
                    min: value,
                    max: value,
                    samples: 1,
                },
                Some(s) => Self {
                    current: value,
                    average: 0.0,
                    min: s.min.min(value),
                    max: s.max.max(value),
                    samples: s.samples + 1,
                },
            });
        }

        summary.map(|mut s| {
            s.average = round2(sum / s.samples as f64);
            s
        })
    }
}

/// Status of one window file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowHealth {
    /// Which window
    pub window: WindowKind,
    /// Backing file
    pub file: PathBuf,
    /// Stored points
    pub points: usize,
    /// Oldest point timestamp
    #[serde(with = "optional_timestamp_format")]
    pub oldest: Option<DateTime<Utc>>,
    /// Newest point timestamp
    #[serde(with = "optional_timestamp_format")]
    pub newest: Option<DateTime<Utc>>,
    /// Last successful write
    #[serde(with = "optional_timestamp_format")]
    pub last_update: Option<DateTime<Utc>>,
    /// Per-metric statistics, by metric name
    pub metrics: BTreeMap<String, MetricSummary>,
}

impl WindowHealth {
    fn from_window(kind: WindowKind, file: PathBuf, window: &Window) -> Self {
        let names: Vec<&String> = {
            let mut names: Vec<&String> =
                window.data_points.iter().flat_map(|p| p.metrics.keys()).collect();
            names.sort();
            names.dedup();
            names
        };
        let metrics = names
            .into_iter()
            .filter_map(|name| {
                MetricSummary::from_points(&window.data_points, name).map(|s| (name.clone(), s))
            })
            .collect();

        Self {
            window: kind,
            file,
            points: window.len(),
            oldest: window.oldest().map(|p| p.timestamp),
            newest: window.newest().map(|p| p.timestamp),
            last_update: window.last_update,
            metrics,
        }
    }
}

/// Collector timing derived from the raw window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStatus {
    /// Last raw window write
    #[serde(with = "optional_timestamp_format")]
    pub last_update: Option<DateTime<Utc>>,
    /// `last_update + collection_interval`
    #[serde(with = "optional_timestamp_format")]
    pub next_collection: Option<DateTime<Utc>>,
    /// Zero once overdue
    pub seconds_until_next: Option<u64>,
    /// Configured collection interval
    pub interval_seconds: u64,
    /// More than one full interval overdue
    pub stale: bool,
}

impl CollectionStatus {
    /// Derive timing from the raw window's `last_update`.
    pub fn compute(last_update: Option<DateTime<Utc>>, interval: Duration, now: DateTime<Utc>) -> Self {
        let step = TimeDelta::from_std(interval).ok();
        let after = |ts: DateTime<Utc>| step.and_then(|step| ts.checked_add_signed(step));
        let next_collection = last_update.and_then(after);

        let seconds_until_next = next_collection
            .map(|next| u64::try_from((next - now).num_seconds()).unwrap_or(0));
        let stale = match next_collection.and_then(after) {
            Some(deadline) => now > deadline,
            None => last_update.is_none(),
        };

        Self {
            last_update,
            next_collection,
            seconds_until_next,
            interval_seconds: interval.as_secs(),
            stale,
        }
    }
}

/// Snapshot of the whole data directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Overall verdict
    pub health: SystemHealth,
    /// When the report was built
    #[serde(with = "crate::core::types::timestamp_format")]
    pub generated_at: DateTime<Utc>,
    /// Data directory inspected
    pub data_dir: PathBuf,
    /// Ingestion paused
    pub maintenance: bool,
    /// Collector timing
    pub collection: CollectionStatus,
    /// One entry per window, raw first
    pub windows: Vec<WindowHealth>,
}

impl HealthReport {
    /// Build a report from the files on disk.
    pub fn collect(config: &Config, store: &WindowStore, now: DateTime<Utc>) -> Self {
        let maintenance = MaintenanceFile::new(&config.maintenance.state_file).is_enabled();

        let windows: Vec<WindowHealth> = WindowKind::ALL
            .iter()
            .map(|kind| {
                let window = store.load(*kind);
                WindowHealth::from_window(*kind, store.path(*kind).to_path_buf(), &window)
            })
            .collect();

        let raw_update = windows
            .iter()
            .find(|w| w.window == WindowKind::Raw)
            .and_then(|w| w.last_update);
        let collection =
            CollectionStatus::compute(raw_update, config.storage.collection_interval, now);

        let health = if raw_update.is_none() {
            SystemHealth::Unhealthy
        } else if maintenance || collection.stale {
            SystemHealth::Degraded
        } else {
            SystemHealth::Healthy
        };

        if health != SystemHealth::Healthy {
            tracing::warn!(?health, maintenance, stale = collection.stale, "data directory not healthy");
        }

        Self {
            health,
            generated_at: now,
            data_dir: store.dir().to_path_buf(),
            maintenance,
            collection,
            windows,
        }
    }

    /// Status of one window.
    pub fn window(&self, kind: WindowKind) -> Option<&WindowHealth> {
        self.windows.iter().find(|w| w.window == kind)
    }
}
