//! Common test utilities and fixtures.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use wattroll_lib::core::{Config, ConfigBuilder, DataPoint};
use wattroll_lib::scheduler::{Clock, CycleScheduler, FixedClock};
use wattroll_lib::storage::{Window, WindowStore};

/// UTC instant helper.
pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Test fixture builder for points with sensible defaults.
pub struct TestPointBuilder {
    point: DataPoint,
}

impl TestPointBuilder {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            point: DataPoint::new(timestamp),
        }
    }

    pub fn value(mut self, value: f64) -> Self {
        self.point = self.point.with_metric("value", value).with_unit("W");
        self
    }

    pub fn metric(mut self, name: &str, value: f64) -> Self {
        self.point = self.point.with_metric(name, value);
        self
    }

    pub fn build(self) -> DataPoint {
        self.point
    }
}

/// A scratch data directory with a store, a fixed clock and a scheduler.
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub store: WindowStore,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_builder(now, ConfigBuilder::new())
    }

    pub fn with_builder(now: DateTime<Utc>, builder: ConfigBuilder) -> Self {
        let dir = TempDir::new().unwrap();
        let config = builder
            .data_dir(dir.path().join("data"))
            .state_file(dir.path().join("state").join("maintenance.json"))
            .build()
            .unwrap();
        let store = WindowStore::open(&config.storage.data_dir, &config.windows).unwrap();

        Self {
            dir,
            config,
            store,
            clock: Arc::new(FixedClock::new(now)),
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn scheduler(&self) -> CycleScheduler {
        CycleScheduler::new(&self.config, self.store.clone(), self.clock.clone()).unwrap()
    }

    pub fn seed(&self, kind: wattroll_lib::core::WindowKind, points: Vec<DataPoint>) {
        self.store
            .save(kind, &Window::from_points(points, None))
            .unwrap();
    }
}

/// One raw sample every `step_minutes` from `start`, valued by `f(i)`.
pub fn samples_every(
    start: DateTime<Utc>,
    step_minutes: i64,
    count: usize,
    f: impl Fn(usize) -> f64,
) -> Vec<DataPoint> {
    (0..count)
        .map(|i| {
            let ts = start + chrono::TimeDelta::minutes(step_minutes * i as i64);
            TestPointBuilder::at(ts).value(f(i)).build()
        })
        .collect()
}
