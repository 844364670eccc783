// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Run Orchestrator
//!
//! Turns a `pending` run into a terminal one: streams the trace window,
//! applies the deterministic sample, fans each admitted item out to the run's
//! evaluator snapshot, and persists scores and per-evaluator aggregates.
//!
//! Failure semantics: a trace-fetch or persistence failure fails the run;
//! an individual evaluator failing on an individual item is recorded as an
//! errored score and counted, and the run still finishes `success`.

use anyhow::{Context, Result};
use futures::{StreamExt, TryStreamExt};
use metrics::counter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::catalog::{CatalogEntry, EvaluatorCatalog};
use crate::application::sampling::DeterministicSampler;
use crate::domain::evaluator::{EvalItem, EvaluatorError};
use crate::domain::monitor::{EvaluatorSpec, Monitor};
use crate::domain::repository::{
    MonitorRepository, MonitorRunRepository, RepositoryError, ScoreRepository,
};
use crate::domain::run::{
    Aggregations, EvaluatorLevel, MonitorRun, MonitorRunId, RunEvaluator, RunEvaluatorId,
    RunStatus, Score,
};
use crate::domain::trace::{Trace, TraceSource, TraceSourceError};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Bound on concurrent evaluator invocations within one run.
    pub eval_concurrency: usize,
    /// Items scored per evaluator between aggregation recomputes.
    pub aggregation_batch: usize,
    /// Wall-clock bound on a single evaluator invocation. A breach is
    /// recorded as an errored score, the run keeps going.
    pub eval_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            eval_concurrency: 8,
            aggregation_batch: 32,
            eval_timeout: Duration::from_secs(30),
        }
    }
}

/// Infrastructure-level failures that terminate the run. Evaluator errors are
/// per-item data, not members of this enum.
#[derive(Debug, Error)]
enum ExecuteError {
    #[error("trace fetch failed: {0}")]
    TraceFetch(#[from] TraceSourceError),

    #[error("persistence failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("evaluator {identifier}@{version} missing from catalog")]
    UnknownEvaluator { identifier: String, version: String },
}

struct EvaluatorSlot {
    spec: EvaluatorSpec,
    entry: CatalogEntry,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    run_evaluator_id: Option<RunEvaluatorId>,
    since_flush: usize,
}

pub struct RunExecutor {
    monitors: Arc<dyn MonitorRepository>,
    runs: Arc<dyn MonitorRunRepository>,
    scores: Arc<dyn ScoreRepository>,
    traces: Arc<dyn TraceSource>,
    catalog: Arc<EvaluatorCatalog>,
    config: ExecutorConfig,
}

impl RunExecutor {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        runs: Arc<dyn MonitorRunRepository>,
        scores: Arc<dyn ScoreRepository>,
        traces: Arc<dyn TraceSource>,
        catalog: Arc<EvaluatorCatalog>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            monitors,
            runs,
            scores,
            traces,
            catalog,
            config,
        }
    }

    /// Drive one run from `pending` to a terminal state. Safe to hand the
    /// same run id twice: anything past `pending` is left alone.
    pub async fn execute(&self, run_id: MonitorRunId) -> Result<()> {
        let mut run = self
            .runs
            .find_by_id(run_id)
            .await?
            .with_context(|| format!("run {} not found", run_id.0))?;
        if run.status != RunStatus::Pending {
            warn!(run = %run.id.0, status = run.status.as_str(), "run already picked up, skipping");
            return Ok(());
        }
        let monitor = self
            .monitors
            .find_by_id(run.monitor_id)
            .await?
            .with_context(|| format!("monitor {} missing for run {}", run.monitor_id.0, run.id.0))?;

        run.start()?;
        self.runs.save(&run).await?;
        info!(
            run = %run.id.0,
            monitor = %monitor.name,
            window_start = %run.trace_start,
            window_end = %run.trace_end,
            "monitor run started"
        );

        match self.process(&monitor, &run).await {
            Ok(()) => {
                run.succeed()?;
                self.runs.save(&run).await?;
                counter!("argus_monitor_runs_succeeded_total").increment(1);
                info!(run = %run.id.0, "monitor run succeeded");
            }
            Err(e) => {
                warn!(run = %run.id.0, error = %e, "monitor run failed");
                run.fail(e.to_string())?;
                self.runs.save(&run).await?;
                counter!("argus_monitor_runs_failed_total").increment(1);
            }
        }
        Ok(())
    }

    async fn process(&self, monitor: &Monitor, run: &MonitorRun) -> Result<(), ExecuteError> {
        // Resolve the snapshot up front so a stale catalog fails the run
        // before any trace is pulled.
        let mut slots = Vec::with_capacity(run.evaluators.len());
        for spec in &run.evaluators {
            let entry = self
                .catalog
                .resolve(Some(monitor.org_id), &spec.identifier, &spec.version)
                .ok_or_else(|| ExecuteError::UnknownEvaluator {
                    identifier: spec.identifier.clone(),
                    version: spec.version.clone(),
                })?;
            slots.push(EvaluatorSlot {
                spec: spec.clone(),
                entry,
                state: Mutex::new(SlotState::default()),
            });
        }

        let sampler = DeterministicSampler::new(run.id, monitor.sampling_rate);
        let scope = monitor.scope();
        let mut stream = self.traces.fetch(&scope, run.trace_start, run.trace_end).await?;

        let mut traces_seen = 0u64;
        while let Some(trace) = stream.try_next().await? {
            traces_seen += 1;
            self.process_trace(run, &slots, &sampler, &trace).await?;
        }

        for slot in &slots {
            let flushed = slot.state.lock().run_evaluator_id;
            if let Some(id) = flushed {
                self.flush_aggregations(id).await?;
            }
        }
        debug!(run = %run.id.0, traces = traces_seen, "trace window drained");
        Ok(())
    }

    /// Fan one trace's admitted items across the run's evaluators, bounded by
    /// `eval_concurrency`. Completion order is irrelevant; each item commits
    /// its score and counter movement atomically on its own.
    async fn process_trace(
        &self,
        run: &MonitorRun,
        slots: &[EvaluatorSlot],
        sampler: &DeterministicSampler,
        trace: &Trace,
    ) -> Result<(), ExecuteError> {
        let mut work = Vec::new();
        for slot in slots {
            match slot.entry.definition.level {
                EvaluatorLevel::Trace | EvaluatorLevel::Agent => {
                    let item = EvalItem::Trace(trace);
                    if sampler.admits(&item.sample_key()) {
                        work.push((slot, item));
                    }
                }
                EvaluatorLevel::Span => {
                    for span in &trace.spans {
                        let item = EvalItem::Span { trace, span };
                        if sampler.admits(&item.sample_key()) {
                            work.push((slot, item));
                        }
                    }
                }
            }
        }

        let evaluations: Vec<_> = work
            .into_iter()
            .map(|(slot, item)| self.evaluate_item(run, slot, item))
            .collect();
        futures::stream::iter(evaluations)
            .buffer_unordered(self.config.eval_concurrency)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    async fn evaluate_item(
        &self,
        run: &MonitorRun,
        slot: &EvaluatorSlot,
        item: EvalItem<'_>,
    ) -> Result<(), ExecuteError> {
        let verdict = match tokio::time::timeout(
            self.config.eval_timeout,
            slot.entry.handler.evaluate(&item, &slot.spec.config),
        )
        .await
        {
            Ok(verdict) => verdict,
            Err(_) => Err(EvaluatorError::Timeout(self.config.eval_timeout.as_secs())),
        };

        let run_evaluator_id = self.slot_run_evaluator(run, slot).await?;
        let trace = item.trace();
        let trace_id = trace.id.clone();
        let span_id = item.span_id().cloned();

        let score = match verdict {
            Ok(v) if (0.0..=1.0).contains(&v.score) => {
                counter!("argus_scores_recorded_total").increment(1);
                Score::scored(
                    run_evaluator_id,
                    trace_id,
                    span_id,
                    v.score,
                    v.explanation,
                    v.metadata,
                    trace.timestamp,
                )
            }
            Ok(v) => {
                counter!("argus_evaluator_errors_total").increment(1);
                Score::errored(
                    run_evaluator_id,
                    trace_id,
                    span_id,
                    format!("evaluator returned score {} outside [0, 1]", v.score),
                    trace.timestamp,
                )
            }
            Err(e) => {
                counter!("argus_evaluator_errors_total").increment(1);
                debug!(
                    run = %run.id.0,
                    evaluator = %slot.spec.display_name(),
                    error = %e,
                    "evaluator errored on item"
                );
                Score::errored(run_evaluator_id, trace_id, span_id, e.to_string(), trace.timestamp)
            }
        };
        self.scores.record_score(&score).await?;

        let flush_due = {
            let mut state = slot.state.lock();
            state.since_flush += 1;
            if state.since_flush >= self.config.aggregation_batch {
                state.since_flush = 0;
                true
            } else {
                false
            }
        };
        if flush_due {
            self.flush_aggregations(run_evaluator_id).await?;
        }
        Ok(())
    }

    /// Aggregate row for this slot, created lazily on the first item. The
    /// repository upsert makes racing creators converge on one row.
    async fn slot_run_evaluator(
        &self,
        run: &MonitorRun,
        slot: &EvaluatorSlot,
    ) -> Result<RunEvaluatorId, ExecuteError> {
        if let Some(id) = slot.state.lock().run_evaluator_id {
            return Ok(id);
        }
        let run_evaluator =
            RunEvaluator::new(run.id, slot.spec.display_name(), slot.entry.definition.level);
        let id = self.scores.ensure_run_evaluator(&run_evaluator).await?;
        slot.state.lock().run_evaluator_id = Some(id);
        Ok(id)
    }

    async fn flush_aggregations(&self, id: RunEvaluatorId) -> Result<(), ExecuteError> {
        let values = self.scores.score_values(id).await?;
        let aggregations = Aggregations::compute(&values);
        self.scores.write_aggregations(id, &aggregations).await?;
        Ok(())
    }
}
