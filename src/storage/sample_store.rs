//! Raw sample ingestion.

use crate::core::{DataPoint, Result, RollupError, SampleInput, WindowKind};
use crate::metrics::MetricCatalog;
use crate::storage::persistence::WindowStore;
use crate::storage::window::Retention;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A sample that did not make it into the raw window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedSample {
    /// Position in the batch (0-based)
    pub index: usize,
    /// Timestamp as received
    pub timestamp: String,
    /// Why it was rejected
    pub reason: String,
}

/// Outcome of a batch ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Samples merged into the raw window
    pub accepted: usize,
    /// Samples rejected individually
    pub rejected: Vec<RejectedSample>,
    /// Raw window size after the write
    pub window_points: usize,
}

impl IngestReport {
    /// True when at least one sample was rejected.
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Appends samples to the raw window, trimming it to retention on every write.
#[derive(Debug, Clone)]
pub struct SampleStore {
    store: WindowStore,
    retention: Retention,
    catalog: MetricCatalog,
}

impl SampleStore {
    /// Create a sample store over the raw window of `store`.
    pub fn new(store: WindowStore, retention: Retention, catalog: MetricCatalog) -> Self {
        Self {
            store,
            retention,
            catalog,
        }
    }

    /// Parse and normalize a single sample without touching disk.
    fn prepare(&self, input: &SampleInput) -> Result<DataPoint> {
        let mut point = input.parse()?;
        self.catalog.normalize_point(&mut point);
        Ok(point)
    }

    /// Ingest one sample.
    ///
    /// A sample that cannot be parsed is rejected with a store error and the
    /// raw window is not written.
    pub fn ingest(&self, input: &SampleInput, now: DateTime<Utc>) -> Result<DataPoint> {
        let point = self.prepare(input)?;
        let window = self.store.load(WindowKind::Raw);
        let updated = window.merge(std::slice::from_ref(&point), &self.retention, now);
        self.store.save(WindowKind::Raw, &updated)?;

        debug!(timestamp = %point.timestamp, points = updated.len(), "ingested sample");
        Ok(point)
    }

    /// Ingest a batch, writing the raw window once.
    ///
    /// Bad samples are skipped and listed in the report; the rest still land.
    /// Nothing is written when every sample was rejected.
    pub fn ingest_batch<'a, I>(&self, inputs: I, now: DateTime<Utc>) -> Result<IngestReport>
    where
        I: IntoIterator<Item = &'a SampleInput>,
    {
        let mut report = IngestReport::default();
        let mut accepted = Vec::new();

        for (index, input) in inputs.into_iter().enumerate() {
            match self.prepare(input) {
                Ok(point) => accepted.push(point),
                Err(e) if e.is_recoverable() => {
                    warn!(index, timestamp = %input.timestamp, error = %e, "rejected sample");
                    report.rejected.push(RejectedSample {
                        index,
                        timestamp: input.timestamp.clone(),
                        reason: e.to_string(),
                    });
                },
                Err(e) => return Err(e),
            }
        }

        let window = self.store.load(WindowKind::Raw);
        if accepted.is_empty() {
            report.window_points = window.len();
            return Ok(report);
        }

        let updated = window.merge(&accepted, &self.retention, now);
        self.store.save(WindowKind::Raw, &updated)?;

        report.accepted = accepted.len();
        report.window_points = updated.len();
        info!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            points = report.window_points,
            "ingested batch"
        );
        Ok(report)
    }

    /// Parse NDJSON lines into inputs, reporting lines that are not JSON.
    ///
    /// Blank lines are ignored.
    pub fn parse_ndjson(text: &str) -> (Vec<SampleInput>, Vec<RejectedSample>) {
        let mut inputs = Vec::new();
        let mut rejected = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SampleInput>(line) {
                Ok(input) => inputs.push(input),
                Err(e) => rejected.push(RejectedSample {
                    index,
                    timestamp: String::new(),
                    reason: RollupError::parse(e.to_string()).to_string(),
                }),
            }
        }

        (inputs, rejected)
    }
}
