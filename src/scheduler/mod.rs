//! Cycle scheduler.
//!
//! Each downstream window (weekly, monthly, yearly) has one [`CycleJob`]. A
//! job becomes due once local wall-clock time passes its `run_at` offset and
//! it has not been attempted for the current local date. A cycle reads the
//! raw window, buckets it, merges the buckets into the target window and
//! saves it. The date is recorded whether the cycle succeeds or fails, so
//! a failing window is retried on the next calendar day, not on the next tick.

pub mod clock;
pub mod job;

pub use clock::{Clock, FixedClock, SystemClock};
pub use job::{CycleJob, CycleReport, CycleStatus, JobPhase, JobState};

use crate::core::{Config, Result, RollupError, WindowKind};
use crate::metrics::{Bucketizer, MetricCatalog};
use crate::storage::WindowStore;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Drives the three downstream rollup cycles.
#[derive(Debug)]
pub struct CycleScheduler {
    store: WindowStore,
    bucketizer: Bucketizer,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    jobs: Vec<CycleJob>,
    states: BTreeMap<WindowKind, JobState>,
}

impl CycleScheduler {
    /// Create a scheduler for every downstream window in `config`.
    pub fn new(config: &Config, store: WindowStore, clock: Arc<dyn Clock>) -> Result<Self> {
        let jobs = WindowKind::DOWNSTREAM
            .iter()
            .map(|kind| CycleJob::from_config(*kind, config.windows.get(*kind)))
            .collect::<Result<Vec<_>>>()?;
        let states = jobs.iter().map(|job| (job.kind, JobState::default())).collect();

        Ok(Self {
            store,
            bucketizer: Bucketizer::new(MetricCatalog::from_config(&config.metrics)),
            clock,
            poll_interval: config.scheduler.poll_interval,
            jobs,
            states,
        })
    }

    /// Configured jobs, in run order.
    pub fn jobs(&self) -> &[CycleJob] {
        &self.jobs
    }

    /// Current state of a job.
    pub fn state(&self, kind: WindowKind) -> Option<&JobState> {
        self.states.get(&kind)
    }

    /// Windows whose cycle is due right now.
    pub fn due(&self) -> Vec<WindowKind> {
        let local_now = self.clock.local_now();
        self.jobs
            .iter()
            .filter(|job| {
                self.states
                    .get(&job.kind)
                    .is_some_and(|state| state.is_due(job.run_at, local_now))
            })
            .map(|job| job.kind)
            .collect()
    }

    /// Run every due cycle. Returns one report per cycle that ran.
    pub fn tick(&mut self) -> Vec<CycleReport> {
        let due = self.due();
        for kind in &due {
            if let Some(state) = self.states.get_mut(kind) {
                state.phase = JobPhase::Due;
            }
        }

        let today = self.clock.local_now().date();
        due.into_iter().map(|kind| self.execute(kind, today)).collect()
    }

    /// Run all downstream cycles now, ignoring the run-at gate.
    ///
    /// A window already attempted today reports [`CycleStatus::AlreadyRan`].
    pub fn run_once(&mut self) -> Vec<CycleReport> {
        let today = self.clock.local_now().date();
        let kinds: Vec<WindowKind> = self.jobs.iter().map(|job| job.kind).collect();

        kinds
            .into_iter()
            .map(|kind| {
                let ran = self.states.get(&kind).is_some_and(|state| state.ran_on(today));
                if ran {
                    debug!(window = %kind, date = %today, "cycle already ran today");
                    CycleReport {
                        window: kind,
                        date: today,
                        status: CycleStatus::AlreadyRan,
                    }
                } else {
                    self.execute(kind, today)
                }
            })
            .collect()
    }

    /// Due → Running → Idle for one job, recording `date` either way.
    fn execute(&mut self, kind: WindowKind, date: NaiveDate) -> CycleReport {
        if let Some(state) = self.states.get_mut(&kind) {
            state.phase = JobPhase::Running;
        }

        let now = self.clock.now();
        let status = match self.jobs.iter().find(|job| job.kind == kind) {
            Some(job) => match self.run_cycle(job, now) {
                Ok(status) => status,
                Err(e) => {
                    error!(window = %kind, date = %date, category = e.category(), error = %e, "rollup cycle failed");
                    CycleStatus::Failed {
                        error: e.to_string(),
                    }
                },
            },
            None => CycleStatus::Failed {
                error: format!("no job configured for {} window", kind),
            },
        };

        if let Some(state) = self.states.get_mut(&kind) {
            state.phase = JobPhase::Idle;
            state.last_run = Some(date);
        }

        CycleReport {
            window: kind,
            date,
            status,
        }
    }

    /// Bucketize the raw window and merge every bucket into the target.
    pub fn run_cycle(&self, job: &CycleJob, now: DateTime<Utc>) -> Result<CycleStatus> {
        let raw = self.store.load(WindowKind::Raw);
        if raw.is_empty() {
            warn!(window = %job.kind, "no raw data to aggregate");
            return Ok(CycleStatus::Skipped {
                reason: "raw window is empty".to_string(),
            });
        }

        // a still-open bucket is published as-is; the next run overwrites it
        let buckets = self.bucketizer.aggregate(&raw.data_points, job.granularity);
        if buckets.is_empty() {
            info!(window = %job.kind, "raw window produced no buckets");
            return Ok(CycleStatus::Skipped {
                reason: "no buckets".to_string(),
            });
        }

        let target = self.store.load(job.kind);
        let merged = target.merge(&buckets, &job.retention, now);
        self.store
            .save(job.kind, &merged)
            .map_err(|e| RollupError::CycleFailed {
                window: job.kind.to_string(),
                reason: e.to_string(),
            })?;

        info!(
            window = %job.kind,
            granularity = %job.granularity,
            buckets = buckets.len(),
            points = merged.len(),
            "rollup cycle completed"
        );
        Ok(CycleStatus::Completed {
            buckets: buckets.len(),
            points: merged.len(),
        })
    }

    /// Poll for due cycles until `shutdown` resolves.
    ///
    /// A cycle in progress always finishes; shutdown is only observed
    /// between ticks.
    pub async fn run_daemon<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.poll_interval.is_zero() {
            return Err(RollupError::config("poll interval must be greater than zero"));
        }

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            poll_interval = ?self.poll_interval,
            jobs = self.jobs.len(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler stopping");
                    break;
                },
                _ = ticker.tick() => {
                    for report in self.tick() {
                        debug!(%report, "cycle finished");
                    }
                },
            }
        }

        Ok(())
    }
}
