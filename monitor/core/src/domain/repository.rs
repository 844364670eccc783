// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per
//! aggregate, interface defined here, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `MonitorRepository` | `Monitor` | `InMemoryStore`, `PostgresMonitorRepository` |
//! | `MonitorRunRepository` | `MonitorRun` | `InMemoryStore`, `PostgresRunRepository` |
//! | `ScoreRepository` | `RunEvaluator` + `Score` | `InMemoryStore`, `PostgresScoreRepository` |
//!
//! The transactional guarantees the scheduler and executor rely on live
//! behind this seam: `create_run_and_advance` re-checks the no-active-run
//! condition inside the transaction that creates the run, and `record_score`
//! commits the score upsert and the aggregate counter movement together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::monitor::{Monitor, MonitorId, OrgId};
use crate::domain::run::{
    Aggregations, MonitorRun, MonitorRunId, RunEvaluator, RunEvaluatorId, Score,
};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Repository interface for Monitor aggregates
#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// Save monitor (create or update)
    async fn save(&self, monitor: &Monitor) -> Result<(), RepositoryError>;

    /// Find monitor by ID
    async fn find_by_id(&self, id: MonitorId) -> Result<Option<Monitor>, RepositoryError>;

    /// Find monitor by organization-unique name
    async fn find_by_name(&self, org_id: OrgId, name: &str)
        -> Result<Option<Monitor>, RepositoryError>;

    /// `future` monitors due at `now` with no run in `{pending, running}`
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Monitor>, RepositoryError>;

    /// Delete monitor by ID (cascades to its runs)
    async fn delete(&self, id: MonitorId) -> Result<(), RepositoryError>;
}

/// Repository interface for MonitorRun aggregates
#[async_trait]
pub trait MonitorRunRepository: Send + Sync {
    /// Create a pending run and advance the monitor's `next_run_time` in one
    /// transaction. The no-active-run condition is re-checked inside the
    /// transaction; returns `false` (and writes nothing) when another
    /// non-terminal run exists for the monitor.
    ///
    /// `next_run_time` is `None` for `past` monitors, which carry no schedule.
    async fn create_run_and_advance(
        &self,
        run: &MonitorRun,
        next_run_time: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError>;

    /// Find run by ID
    async fn find_by_id(&self, id: MonitorRunId) -> Result<Option<MonitorRun>, RepositoryError>;

    /// Persist a status transition
    async fn save(&self, run: &MonitorRun) -> Result<(), RepositoryError>;

    /// Run history for a monitor, newest first
    async fn list_for_monitor(
        &self,
        monitor_id: MonitorId,
    ) -> Result<Vec<MonitorRun>, RepositoryError>;

    /// Fail runs stuck before `cutoff`: `running` runs started earlier, and
    /// `pending` runs created earlier but never picked up. Returns the number
    /// of runs swept.
    async fn fail_stuck_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, RepositoryError>;
}

/// Repository interface for per-run evaluator aggregates and scores
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// Create the `(run, display_name)` aggregate if absent and return its id.
    /// Idempotent under concurrent callers.
    async fn ensure_run_evaluator(
        &self,
        run_evaluator: &RunEvaluator,
    ) -> Result<RunEvaluatorId, RepositoryError>;

    /// Upsert one score on `(run_evaluator_id, trace_id, span_id)`, where an
    /// absent span id conflicts with absent, and move the aggregate's
    /// `count`/`error_count` accordingly, in one transaction.
    /// Re-recording an item replaces its score without double-counting.
    async fn record_score(&self, score: &Score) -> Result<(), RepositoryError>;

    /// Score values (successful items only) for aggregation recompute
    async fn score_values(&self, id: RunEvaluatorId) -> Result<Vec<f64>, RepositoryError>;

    /// Write back recomputed aggregations
    async fn write_aggregations(
        &self,
        id: RunEvaluatorId,
        aggregations: &Aggregations,
    ) -> Result<(), RepositoryError>;

    /// All aggregates for one run
    async fn run_evaluators_for_run(
        &self,
        run_id: MonitorRunId,
    ) -> Result<Vec<RunEvaluator>, RepositoryError>;

    /// All scores under one aggregate (history/debugging surface)
    async fn scores_for_run_evaluator(
        &self,
        id: RunEvaluatorId,
    ) -> Result<Vec<Score>, RepositoryError>;
}
