// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Scheduler
//!
//! Single periodic loop that decides which `future` monitors are due, creates
//! at most one new run per due monitor, and hands each run off to the
//! executor as an independent unit of work. Dispatch never blocks on
//! execution: a slow evaluation cannot delay the next tick.
//!
//! At most one non-terminal run per monitor is enforced by the due-selection
//! query plus the re-check inside `create_run_and_advance`, not by in-process
//! locking, so scheduler and executor may run as separate replicas sharing
//! only the database. A stuck run therefore blocks further dispatch for its
//! monitor; the per-tick sweep bounds how long.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::executor::RunExecutor;
use crate::domain::monitor::{Monitor, MonitorKind};
use crate::domain::repository::{MonitorRepository, MonitorRunRepository};
use crate::domain::run::{MonitorRun, MonitorRunId};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Polling cadence of the tick loop.
    pub poll_interval: Duration,
    /// Runs older than this in `pending`/`running` are swept to `failed`.
    pub run_timeout: ChronoDuration,
    /// Bound on concurrently executing runs in this process.
    pub max_concurrent_runs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            run_timeout: ChronoDuration::minutes(60),
            max_concurrent_runs: 4,
        }
    }
}

pub struct MonitorScheduler {
    monitors: Arc<dyn MonitorRepository>,
    runs: Arc<dyn MonitorRunRepository>,
    executor: Arc<RunExecutor>,
    permits: Arc<Semaphore>,
    config: SchedulerConfig,
}

impl MonitorScheduler {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        runs: Arc<dyn MonitorRunRepository>,
        executor: Arc<RunExecutor>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs));
        Self {
            monitors,
            runs,
            executor,
            permits,
            config,
        }
    }

    /// One scheduling pass. Returns the number of runs dispatched.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();

        let cutoff = now - self.config.run_timeout;
        let swept = self
            .runs
            .fail_stuck_runs(cutoff, "run exceeded configured timeout")
            .await?;
        if swept > 0 {
            counter!("argus_monitor_runs_swept_total").increment(swept);
            warn!(swept, "stale runs failed by timeout sweep");
        }

        let due = self.monitors.find_due(now).await?;
        let mut dispatched = 0;
        for monitor in due {
            let (window_start, window_end) = monitor.next_window(now);
            let run = MonitorRun::dispatch(&monitor, window_start, window_end);
            let next_run_time = monitor.advanced_next_run_time(now);
            let created = self
                .runs
                .create_run_and_advance(&run, next_run_time)
                .await?;
            if !created {
                // Another replica won the race since find_due; its run stands.
                continue;
            }
            counter!("argus_monitor_runs_dispatched_total").increment(1);
            info!(
                monitor = %monitor.name,
                run = %run.id.0,
                window_start = %window_start,
                window_end = %window_end,
                "monitor run dispatched"
            );
            self.spawn_execution(run.id);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// `past` monitors are dispatched once, at creation, through the same
    /// hand-off path as scheduled runs. Returns `None` when a run for the
    /// monitor already exists.
    pub async fn dispatch_past(&self, monitor: &Monitor) -> Result<Option<MonitorRunId>> {
        debug_assert_eq!(monitor.kind, MonitorKind::Past);
        let (window_start, window_end) = monitor.next_window(Utc::now());
        let run = MonitorRun::dispatch(monitor, window_start, window_end);
        if !self.runs.create_run_and_advance(&run, None).await? {
            return Ok(None);
        }
        counter!("argus_monitor_runs_dispatched_total").increment(1);
        info!(monitor = %monitor.name, run = %run.id.0, "backfill run dispatched");
        self.spawn_execution(run.id);
        Ok(Some(run.id))
    }

    fn spawn_execution(&self, run_id: MonitorRunId) {
        let executor = Arc::clone(&self.executor);
        let permits = Arc::clone(&self.permits);
        // Take the permit before spawning when capacity allows, so drain()
        // called right after a tick observes the execution as in flight.
        let permit = Arc::clone(&permits).try_acquire_owned().ok();
        tokio::spawn(async move {
            let _permit = match permit {
                Some(permit) => permit,
                None => match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    // Closed only at shutdown; the run stays pending until
                    // the stuck-run sweep fails it.
                    Err(_) => return,
                },
            };
            if let Err(e) = executor.execute(run_id).await {
                error!(run = %run_id.0, error = %e, "run execution errored");
            }
        });
    }

    /// Wait until every spawned execution has finished. One-shot callers use
    /// this after `tick()`; the periodic loop never blocks on it.
    pub async fn drain(&self) {
        let _ = self
            .permits
            .acquire_many(self.config.max_concurrent_runs as u32)
            .await;
    }

    /// Periodic task wrapping `tick()`. Stops cleanly when `cancel` fires,
    /// finishing the in-flight tick first.
    pub async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "monitor scheduler started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("monitor scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        // Scheduling errors are retried on the next cycle.
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }
}
