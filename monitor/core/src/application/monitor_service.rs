// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Monitor Application Service
//!
//! Creation-time validation and the run-history surface. Creation rejects a
//! malformed evaluator config synchronously, before any run is ever
//! scheduled; `past` monitors are handed to the scheduler for their single
//! backfill dispatch as part of creation.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::application::catalog::EvaluatorCatalog;
use crate::application::scheduler::MonitorScheduler;
use crate::domain::monitor::{
    AgentId, EnvironmentId, EvaluatorSpec, Monitor, MonitorId, MonitorKind, OrgId, ProjectId,
};
use crate::domain::repository::{MonitorRepository, MonitorRunRepository, ScoreRepository};
use crate::domain::run::{MonitorRun, RunEvaluator};

#[derive(Debug, Clone)]
pub struct CreateMonitorRequest {
    pub name: String,
    pub display_name: String,
    pub kind: MonitorKind,
    pub org_id: OrgId,
    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub environment_id: EnvironmentId,
    pub evaluators: Vec<EvaluatorSpec>,
    /// Required for `future` monitors.
    pub interval_minutes: Option<i64>,
    /// Required for `past` monitors.
    pub trace_start: Option<DateTime<Utc>>,
    pub trace_end: Option<DateTime<Utc>>,
    pub sampling_rate: f64,
}

/// A run plus its per-evaluator aggregates: terminal status alongside
/// success/error counts, so partial degradation stays visible.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: MonitorRun,
    pub evaluators: Vec<RunEvaluator>,
}

#[async_trait]
pub trait MonitorService: Send + Sync {
    async fn create_monitor(&self, request: CreateMonitorRequest) -> Result<Monitor>;
    async fn get_monitor(&self, id: MonitorId) -> Result<Monitor>;
    async fn delete_monitor(&self, id: MonitorId) -> Result<()>;
    async fn run_history(&self, id: MonitorId) -> Result<Vec<RunSummary>>;
}

pub struct StandardMonitorService {
    monitors: Arc<dyn MonitorRepository>,
    runs: Arc<dyn MonitorRunRepository>,
    scores: Arc<dyn ScoreRepository>,
    catalog: Arc<EvaluatorCatalog>,
    scheduler: Arc<MonitorScheduler>,
}

impl StandardMonitorService {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        runs: Arc<dyn MonitorRunRepository>,
        scores: Arc<dyn ScoreRepository>,
        catalog: Arc<EvaluatorCatalog>,
        scheduler: Arc<MonitorScheduler>,
    ) -> Self {
        Self {
            monitors,
            runs,
            scores,
            catalog,
            scheduler,
        }
    }
}

#[async_trait]
impl MonitorService for StandardMonitorService {
    async fn create_monitor(&self, request: CreateMonitorRequest) -> Result<Monitor> {
        if self
            .monitors
            .find_by_name(request.org_id, &request.name)
            .await?
            .is_some()
        {
            bail!("monitor '{}' already exists in this organization", request.name);
        }

        self.catalog
            .validate_specs(request.org_id, &request.evaluators)
            .context("evaluator config rejected")?;

        let monitor = match request.kind {
            MonitorKind::Future => Monitor::future(
                request.name,
                request.display_name,
                request.org_id,
                request.project_id,
                request.agent_id,
                request.environment_id,
                request.evaluators,
                request
                    .interval_minutes
                    .context("future monitor requires interval_minutes")?,
                request.sampling_rate,
            )?,
            MonitorKind::Past => Monitor::past(
                request.name,
                request.display_name,
                request.org_id,
                request.project_id,
                request.agent_id,
                request.environment_id,
                request.evaluators,
                request.trace_start.context("past monitor requires trace_start")?,
                request.trace_end.context("past monitor requires trace_end")?,
                request.sampling_rate,
            )?,
        };

        self.monitors.save(&monitor).await?;
        info!(monitor = %monitor.name, kind = monitor.kind.as_str(), "monitor created");

        // Backfills run exactly once, immediately.
        if monitor.kind == MonitorKind::Past {
            self.scheduler.dispatch_past(&monitor).await?;
        }
        Ok(monitor)
    }

    async fn get_monitor(&self, id: MonitorId) -> Result<Monitor> {
        self.monitors
            .find_by_id(id)
            .await?
            .with_context(|| format!("monitor {} not found", id.0))
    }

    async fn delete_monitor(&self, id: MonitorId) -> Result<()> {
        self.monitors.delete(id).await?;
        info!(monitor = %id.0, "monitor deleted");
        Ok(())
    }

    async fn run_history(&self, id: MonitorId) -> Result<Vec<RunSummary>> {
        let runs = self.runs.list_for_monitor(id).await?;
        let mut history = Vec::with_capacity(runs.len());
        for run in runs {
            let evaluators = self.scores.run_evaluators_for_run(run.id).await?;
            history.push(RunSummary { run, evaluators });
        }
        Ok(history)
    }
}
