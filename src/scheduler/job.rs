//! Rollup jobs and their per-window state.

use crate::core::{Result, RollupError, WindowConfig, WindowKind};
use crate::metrics::Granularity;
use crate::storage::Retention;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;

/// A downstream window's rollup definition.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleJob {
    /// Target window
    pub kind: WindowKind,
    /// Bucket width applied to the raw window
    pub granularity: Granularity,
    /// Retention of the target window
    pub retention: Retention,
    /// Local time of day from which the job is due
    pub run_at: NaiveTime,
}

impl CycleJob {
    /// Build a job from a downstream window's configuration.
    pub fn from_config(kind: WindowKind, config: &WindowConfig) -> Result<Self> {
        let granularity = config.granularity.ok_or_else(|| {
            RollupError::config(format!("{} window has no granularity", kind))
        })?;
        let run_at = config
            .run_at
            .ok_or_else(|| RollupError::config(format!("{} window has no run_at", kind)))?;

        Ok(Self {
            kind,
            granularity,
            retention: config.retention_policy(),
            run_at,
        })
    }
}

/// Where a job is in its daily cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    /// Waiting for its run-at time, or already ran today
    #[default]
    Idle,
    /// Run-at time reached and not yet run today
    Due,
    /// Cycle in progress
    Running,
}

/// Scheduler bookkeeping for one job. Held in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    /// Where the job is in its daily cycle
    pub phase: JobPhase,
    /// Local date of the last attempt, successful or not
    pub last_run: Option<NaiveDate>,
}

impl JobState {
    /// True once the job has been attempted on `date`.
    pub fn ran_on(&self, date: NaiveDate) -> bool {
        self.last_run == Some(date)
    }

    /// Idle → Due check against local wall-clock time.
    pub fn is_due(&self, run_at: NaiveTime, local_now: NaiveDateTime) -> bool {
        local_now.time() >= run_at && !self.ran_on(local_now.date())
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleStatus {
    /// Buckets published into the target window
    Completed {
        /// Buckets produced from the raw window
        buckets: usize,
        /// Points in the target window after the merge
        points: usize,
    },
    /// Nothing to do (e.g. no raw data)
    Skipped {
        /// Why nothing was written
        reason: String,
    },
    /// Already attempted for this date
    AlreadyRan,
    /// Cycle failed; not retried until the next date
    Failed {
        /// Error message
        error: String,
    },
}

/// One cycle outcome for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Target window
    pub window: WindowKind,
    /// Local date the cycle ran for
    pub date: NaiveDate,
    /// Outcome
    #[serde(flatten)]
    pub status: CycleStatus,
}

impl CycleReport {
    /// True when the cycle failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.status, CycleStatus::Failed { .. })
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            CycleStatus::Completed { buckets, points } => write!(
                f,
                "{} {}: published {} buckets, window holds {} points",
                self.window, self.date, buckets, points
            ),
            CycleStatus::Skipped { reason } => {
                write!(f, "{} {}: skipped ({})", self.window, self.date, reason)
            },
            CycleStatus::AlreadyRan => write!(f, "{} {}: already ran", self.window, self.date),
            CycleStatus::Failed { error } => {
                write!(f, "{} {}: FAILED: {}", self.window, self.date, error)
            },
        }
    }
}
