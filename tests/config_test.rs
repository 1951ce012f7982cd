//! Configuration system tests.

use chrono::NaiveTime;
use std::path::PathBuf;
use std::time::Duration;
use wattroll_lib::core::{Config, ConfigBuilder, WindowKind};
use wattroll_lib::metrics::{Granularity, MetricCatalog, ReductionKind};

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.storage.data_dir, PathBuf::from("./wattroll_data"));
    assert_eq!(config.storage.collection_interval, Duration::from_secs(600));
    assert_eq!(config.scheduler.poll_interval, Duration::from_secs(60));
    assert_eq!(
        config.window_path(WindowKind::Raw),
        PathBuf::from("./wattroll_data/daily.json")
    );
}

#[test]
fn test_config_builder() {
    let config = ConfigBuilder::new()
        .data_dir(PathBuf::from("/var/lib/wattroll"))
        .retention(WindowKind::Weekly, Duration::from_secs(14 * 86_400))
        .max_points(WindowKind::Yearly, Some(400))
        .run_at(WindowKind::Monthly, NaiveTime::from_hms_opt(1, 30, 0).unwrap())
        .poll_interval(Duration::from_secs(30))
        .reduction("grid_import", ReductionKind::Max)
        .debug(true)
        .build()
        .unwrap();

    assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/wattroll"));
    assert_eq!(config.windows.weekly.retention, Duration::from_secs(14 * 86_400));
    assert_eq!(config.windows.yearly.max_points, Some(400));
    assert_eq!(config.windows.monthly.run_at, NaiveTime::from_hms_opt(1, 30, 0));
    assert_eq!(config.scheduler.poll_interval, Duration::from_secs(30));
    assert!(config.debug);

    let catalog = MetricCatalog::from_config(&config.metrics);
    assert_eq!(catalog.reduction("grid_import"), ReductionKind::Max);
}

#[test]
fn test_yaml_config() {
    let yaml = r#"
storage:
  data_dir: /srv/power/data
  collection_interval: 5m
windows:
  raw:
    file: daily.json
    retention: 26h
  weekly:
    file: weekly.json
    retention: 7days
    granularity: hourly
    run_at: "00:02"
  monthly:
    file: monthly.json
    retention: 30days
    max_points: 31
    granularity: daily
    run_at: "00:05"
  yearly:
    file: yearly.json
    retention: 365days
    granularity: daily
    run_at: "00:15:30"
scheduler:
  poll_interval: 30s
metrics:
  reductions:
    battery_cycles: max
  non_negative:
    - battery
maintenance:
  state_file: /srv/power/state/maintenance.json
logging:
  level: debug
  structured: true
"#;

    let config = ConfigBuilder::new()
        .from_yaml(yaml)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.storage.data_dir, PathBuf::from("/srv/power/data"));
    assert_eq!(config.storage.collection_interval, Duration::from_secs(300));
    assert_eq!(config.windows.raw.retention, Duration::from_secs(26 * 3600));
    assert_eq!(config.windows.monthly.max_points, Some(31));
    assert_eq!(config.windows.weekly.granularity, Some(Granularity::Hourly));
    assert_eq!(config.windows.yearly.run_at, NaiveTime::from_hms_opt(0, 15, 30));
    assert_eq!(config.scheduler.poll_interval, Duration::from_secs(30));
    assert_eq!(
        config.metrics.reductions.get("battery_cycles"),
        Some(&ReductionKind::Max)
    );
    assert_eq!(config.logging.level.as_str(), "debug");
    assert!(config.logging.structured);
}

#[test]
fn test_partial_yaml_keeps_defaults() {
    let config = ConfigBuilder::new()
        .from_yaml("scheduler:\n  poll_interval: 2m\n")
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.scheduler.poll_interval, Duration::from_secs(120));
    assert_eq!(config.windows.monthly.file, "monthly.json");
    assert_eq!(config.storage.collection_interval, Duration::from_secs(600));
}

#[test]
fn test_config_validation() {
    assert!(Config::default().validate().is_ok());

    // Zero retention
    let invalid = ConfigBuilder::new()
        .retention(WindowKind::Monthly, Duration::ZERO)
        .build();
    assert!(invalid.is_err());

    // Zero point ceiling
    let invalid = ConfigBuilder::new()
        .max_points(WindowKind::Raw, Some(0))
        .build();
    assert!(invalid.is_err());

    // Zero poll interval
    let invalid = ConfigBuilder::new().poll_interval(Duration::ZERO).build();
    assert!(invalid.is_err());

    // Empty data directory
    let invalid = ConfigBuilder::new().data_dir(PathBuf::new()).build();
    assert!(invalid.is_err());

    // File names must stay inside the data directory
    let mut config = Config::default();
    config.windows.weekly.file = "../weekly.json".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_yaml() {
    assert!(ConfigBuilder::new().from_yaml("storage: [not, a, map]").is_err());

    let bad_time = "windows:\n  weekly:\n    file: weekly.json\n    retention: 7days\n    granularity: hourly\n    run_at: \"25:99\"\n";
    assert!(ConfigBuilder::new().from_yaml(bad_time).is_err());
}
