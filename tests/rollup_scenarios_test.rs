//! End-to-end rollup tests: ingestion, daily cycles and window invariants.

mod common;

use common::{samples_every, utc, Harness, TestPointBuilder};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wattroll_lib::core::{ConfigBuilder, DataPoint, SampleInput, WindowKind};
use wattroll_lib::metrics::{Bucketizer, Granularity};
use wattroll_lib::scheduler::CycleStatus;
use wattroll_lib::storage::{Retention, SampleStore, Window};

fn sample_store(harness: &Harness) -> SampleStore {
    SampleStore::new(
        harness.store.clone(),
        harness.config.windows.raw.retention_policy(),
        Default::default(),
    )
}

#[test]
fn test_single_sample_reaches_weekly_window() {
    let harness = Harness::new(utc(2024, 1, 1, 0, 10));
    let samples = sample_store(&harness);

    samples
        .ingest(
            &SampleInput::single("2024-01-01T00:10:00Z", 150.0, "W"),
            harness.clock_now(),
        )
        .unwrap();

    let raw = harness.store.load(WindowKind::Raw);
    assert_eq!(raw.len(), 1);
    assert_eq!(raw.data_points[0].value(), Some(150.0));

    // next local midnight, weekly cycle due at 00:02
    harness.clock.set(utc(2024, 1, 2, 0, 2));
    let reports = harness.scheduler().tick();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].window, WindowKind::Weekly);

    let weekly = harness.store.load(WindowKind::Weekly);
    assert_eq!(
        weekly.data_points,
        vec![DataPoint::single(utc(2024, 1, 1, 0, 0), 150.0, "W")]
    );
    assert_eq!(weekly.last_update, Some(utc(2024, 1, 2, 0, 2)));
}

#[test]
fn test_rerun_replaces_existing_bucket() {
    let harness = Harness::new(utc(2024, 1, 3, 0, 2));
    harness.seed(
        WindowKind::Weekly,
        vec![TestPointBuilder::at(utc(2024, 1, 2, 3, 0)).value(100.0).build()],
    );
    harness.seed(
        WindowKind::Raw,
        vec![
            TestPointBuilder::at(utc(2024, 1, 2, 3, 0)).value(110.0).build(),
            TestPointBuilder::at(utc(2024, 1, 2, 3, 30)).value(130.0).build(),
        ],
    );

    let reports = harness.scheduler().tick();
    assert!(matches!(reports[0].status, CycleStatus::Completed { buckets: 1, points: 1 }));

    let weekly = harness.store.load(WindowKind::Weekly);
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly.data_points[0].value(), Some(120.0));
}

#[test]
fn test_hourly_and_counter_reductions() {
    let points = vec![
        TestPointBuilder::at(utc(2024, 1, 1, 5, 0)).metric("power", 100.0).metric("daily_energy", 100.0).build(),
        TestPointBuilder::at(utc(2024, 1, 1, 5, 10)).metric("power", 200.0).metric("daily_energy", 200.0).build(),
        TestPointBuilder::at(utc(2024, 1, 1, 5, 20)).metric("power", 300.0).metric("daily_energy", 300.0).build(),
    ];

    let hourly = Bucketizer::default().aggregate(&points, Granularity::Hourly);
    assert_eq!(hourly.len(), 1);
    assert_eq!(hourly[0].metric("power"), Some(200.0));
    assert_eq!(hourly[0].metric("daily_energy"), Some(300.0));
}

#[test]
fn test_full_day_rollup_into_every_window() {
    let harness = Harness::new(utc(2024, 3, 11, 0, 30));
    // 10-minute samples for all of March 10th
    harness.seed(
        WindowKind::Raw,
        samples_every(utc(2024, 3, 10, 0, 0), 10, 144, |i| (i / 6) as f64 * 10.0),
    );

    let reports = harness.scheduler().run_once();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| !r.is_failure()));

    let weekly = harness.store.load(WindowKind::Weekly);
    assert_eq!(weekly.len(), 24);
    assert_eq!(weekly.oldest().unwrap().timestamp, utc(2024, 3, 10, 0, 0));
    assert_eq!(weekly.newest().unwrap().value(), Some(230.0));

    for kind in [WindowKind::Monthly, WindowKind::Yearly] {
        let window = harness.store.load(kind);
        assert_eq!(window.len(), 1, "{} window", kind);
        assert_eq!(window.data_points[0].timestamp, utc(2024, 3, 10, 0, 0));
        // mean of 0, 10, ..., 230
        assert_eq!(window.data_points[0].value(), Some(115.0));
    }
}

#[test]
fn test_partial_day_is_corrected_next_day() {
    let harness = Harness::new(utc(2024, 3, 11, 0, 30));
    harness.seed(
        WindowKind::Raw,
        samples_every(utc(2024, 3, 10, 12, 0), 30, 25, |_| 50.0),
    );

    harness.scheduler().run_once();

    // the 11th is open at 00:30 but published from its single sample
    let monthly = harness.store.load(WindowKind::Monthly);
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly.get(utc(2024, 3, 11, 0, 0)).and_then(DataPoint::value), Some(50.0));
    let weekly = harness.store.load(WindowKind::Weekly);
    assert_eq!(weekly.newest().unwrap().timestamp, utc(2024, 3, 11, 0, 0));

    harness.seed(
        WindowKind::Raw,
        samples_every(utc(2024, 3, 11, 0, 0), 60, 24, |_| 150.0),
    );
    harness.clock.set(utc(2024, 3, 12, 0, 30));
    harness.scheduler().run_once();

    let monthly = harness.store.load(WindowKind::Monthly);
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly.get(utc(2024, 3, 10, 0, 0)).and_then(DataPoint::value), Some(50.0));
    assert_eq!(monthly.get(utc(2024, 3, 11, 0, 0)).and_then(DataPoint::value), Some(150.0));
}

#[test]
fn test_run_once_right_after_first_sample() {
    let harness = Harness::new(utc(2024, 1, 1, 0, 10));
    sample_store(&harness)
        .ingest(
            &SampleInput::single("2024-01-01T00:10:00Z", 150.0, "W"),
            harness.clock_now(),
        )
        .unwrap();

    harness.clock.set(utc(2024, 1, 1, 0, 30));
    let reports = harness.scheduler().run_once();
    assert!(reports
        .iter()
        .all(|r| matches!(r.status, CycleStatus::Completed { buckets: 1, points: 1 })));

    assert_eq!(
        harness.store.load(WindowKind::Weekly).data_points,
        vec![DataPoint::single(utc(2024, 1, 1, 0, 0), 150.0, "W")]
    );
}

#[test]
fn test_cycles_run_once_per_local_date() {
    let harness = Harness::new(utc(2024, 5, 1, 0, 20));
    harness.seed(
        WindowKind::Raw,
        samples_every(utc(2024, 4, 30, 1, 0), 60, 23, |i| i as f64),
    );
    let mut scheduler = harness.scheduler();

    assert_eq!(scheduler.tick().len(), 3);
    harness.clock.set(utc(2024, 5, 1, 23, 59));
    assert!(scheduler.tick().is_empty());

    harness.clock.set(utc(2024, 5, 2, 0, 1));
    assert!(scheduler.tick().is_empty());
    harness.clock.set(utc(2024, 5, 2, 0, 2));
    let reports = scheduler.tick();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].window, WindowKind::Weekly);
}

#[test]
fn test_retention_trims_downstream_windows() {
    let builder = ConfigBuilder::new().max_points(WindowKind::Monthly, Some(3));
    let harness = Harness::with_builder(utc(2024, 2, 1, 0, 10), builder);

    let old_days: Vec<DataPoint> = (1..=20)
        .map(|d| TestPointBuilder::at(utc(2023, 12, d, 0, 0)).value(1.0).build())
        .collect();
    harness.seed(WindowKind::Monthly, old_days.clone());
    harness.seed(WindowKind::Weekly, old_days);
    harness.seed(
        WindowKind::Raw,
        samples_every(utc(2024, 1, 31, 0, 0), 60, 24, |_| 42.0),
    );

    harness.scheduler().run_once();

    let weekly = harness.store.load(WindowKind::Weekly);
    let cutoff = utc(2024, 1, 25, 0, 10);
    assert!(weekly.data_points.iter().all(|p| p.timestamp >= cutoff));
    assert_eq!(weekly.len(), 24);

    let monthly = harness.store.load(WindowKind::Monthly);
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly.data_points[0].value(), Some(42.0));
}

#[test]
fn test_point_ceiling_drops_oldest() {
    let retention = Retention::new(Duration::from_secs(365 * 86_400), Some(3));
    let points = samples_every(utc(2024, 1, 1, 0, 0), 60, 5, |i| i as f64);

    let window = Window::empty().merge(&points, &retention, utc(2024, 1, 2, 0, 0));
    let values: Vec<f64> = window.data_points.iter().filter_map(DataPoint::value).collect();
    assert_eq!(values, vec![2.0, 3.0, 4.0]);
}

#[test]
fn test_merge_properties() {
    let retention = Retention::new(Duration::from_secs(7 * 86_400), None);
    let now = utc(2024, 1, 10, 0, 0);
    let existing = Window::from_points(
        samples_every(utc(2024, 1, 1, 0, 0), 360, 30, |i| i as f64),
        Some(utc(2024, 1, 9, 0, 0)),
    );
    let incoming = samples_every(utc(2024, 1, 8, 0, 0), 90, 20, |i| 1000.0 + i as f64);

    let once = existing.merge(&incoming, &retention, now);
    let twice = once.merge(&incoming, &retention, now);

    assert_eq!(once, twice);
    assert!(once.is_strictly_ascending());
    assert!(once
        .data_points
        .iter()
        .all(|p| p.timestamp >= utc(2024, 1, 3, 0, 0)));
    // incoming points win on collisions
    assert_eq!(once.get(utc(2024, 1, 8, 0, 0)).and_then(DataPoint::value), Some(1000.0));
}

#[test]
fn test_batch_ingest_then_rollup() {
    let harness = Harness::new(utc(2024, 6, 1, 23, 50));
    let samples = sample_store(&harness);

    let text = (0..6)
        .map(|i| {
            format!(
                "{{\"timestamp\": \"2024-06-01T22:{:02}:00Z\", \"power\": {}, \"voltage\": 230.{}, \"daily_energy\": {}}}",
                i * 10,
                100 + i * 10,
                i,
                i * 2
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let (inputs, malformed) = SampleStore::parse_ndjson(&text);
    assert!(malformed.is_empty());

    let report = samples.ingest_batch(&inputs, harness.clock_now()).unwrap();
    assert_eq!(report.accepted, 6);

    harness.clock.set(utc(2024, 6, 2, 0, 20));
    harness.scheduler().tick();

    let weekly = harness.store.load(WindowKind::Weekly);
    assert_eq!(weekly.len(), 1);
    let hour = &weekly.data_points[0];
    assert_eq!(hour.timestamp, utc(2024, 6, 1, 22, 0));
    assert_eq!(hour.metric("power"), Some(125.0));
    assert_eq!(hour.metric("voltage"), Some(230.25));
    assert_eq!(hour.metric("daily_energy"), Some(10.0));
    assert_eq!(hour.unit, None);
}
