// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::monitor::{Monitor, MonitorId, EvaluatorSpec};
use crate::domain::trace::{SpanId, TraceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorRunId(pub Uuid);

impl MonitorRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MonitorRunId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunEvaluatorId(pub Uuid);

impl RunEvaluatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunEvaluatorId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

/// Granularity an evaluator operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorLevel {
    Trace,
    Agent,
    Span,
}

impl EvaluatorLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatorLevel::Trace => "trace",
            EvaluatorLevel::Agent => "agent",
            EvaluatorLevel::Span => "span",
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid transition: run is {0:?}")]
    InvalidTransition(RunStatus),
}

/// One execution attempt of a Monitor over a concrete trace window.
///
/// The evaluator list is a snapshot taken at dispatch time so later edits to
/// the monitor never change what a historical run meant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRun {
    pub id: MonitorRunId,
    pub monitor_id: MonitorId,
    /// Correlates to an external workflow execution; opaque to this subsystem.
    pub name: String,
    pub evaluators: Vec<EvaluatorSpec>,
    pub trace_start: DateTime<Utc>,
    pub trace_end: DateTime<Utc>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MonitorRun {
    pub fn dispatch(
        monitor: &Monitor,
        trace_start: DateTime<Utc>,
        trace_end: DateTime<Utc>,
    ) -> Self {
        let id = MonitorRunId::new();
        Self {
            id,
            monitor_id: monitor.id,
            name: format!("{}-{}", monitor.name, trace_end.timestamp()),
            evaluators: monitor.evaluators.clone(),
            trace_start,
            trace_end,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn start(&mut self) -> Result<(), RunError> {
        if self.status != RunStatus::Pending {
            return Err(RunError::InvalidTransition(self.status));
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), RunError> {
        if self.status != RunStatus::Running {
            return Err(RunError::InvalidTransition(self.status));
        }
        self.status = RunStatus::Success;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, message: String) -> Result<(), RunError> {
        if self.status.is_terminal() {
            return Err(RunError::InvalidTransition(self.status));
        }
        self.status = RunStatus::Failed;
        self.error_message = Some(message);
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// Numeric summary over the successfully scored items of one run evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aggregations {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub scored: u64,
}

impl Aggregations {
    /// Summary statistics over the given score values. Errored items carry no
    /// value and never enter the aggregation.
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let sum: f64 = sorted.iter().sum();
        let percentile = |p: f64| -> f64 {
            let rank = (p * (sorted.len() - 1) as f64).round() as usize;
            sorted[rank.min(sorted.len() - 1)]
        };
        Self {
            mean: sum / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p50: percentile(0.50),
            p95: percentile(0.95),
            scored: sorted.len() as u64,
        }
    }
}

/// Per-(run, evaluator) aggregate: counts and score summary. Created lazily
/// the first time the evaluator produces an item for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvaluator {
    pub id: RunEvaluatorId,
    pub monitor_run_id: MonitorRunId,
    pub display_name: String,
    pub level: EvaluatorLevel,
    pub aggregations: Aggregations,
    pub count: i64,
    pub error_count: i64,
}

impl RunEvaluator {
    pub fn new(monitor_run_id: MonitorRunId, display_name: String, level: EvaluatorLevel) -> Self {
        Self {
            id: RunEvaluatorId::new(),
            monitor_run_id,
            display_name,
            level,
            aggregations: Aggregations::default(),
            count: 0,
            error_count: 0,
        }
    }
}

/// One evaluator's outcome for one trace, or one span within it.
///
/// `score` and `error` are mutually exclusive; the constructors are the only
/// way to build one, so a score row can never carry both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub run_evaluator_id: RunEvaluatorId,
    pub trace_id: TraceId,
    /// Absent for trace-level scores. Absence is a single equivalence class
    /// for uniqueness: re-scoring the same trace-level item upserts.
    pub span_id: Option<SpanId>,
    pub score: Option<f64>,
    pub error: Option<String>,
    pub explanation: Option<String>,
    pub metadata: serde_json::Value,
    pub trace_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Score {
    pub fn scored(
        run_evaluator_id: RunEvaluatorId,
        trace_id: TraceId,
        span_id: Option<SpanId>,
        score: f64,
        explanation: Option<String>,
        metadata: serde_json::Value,
        trace_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            run_evaluator_id,
            trace_id,
            span_id,
            score: Some(score),
            error: None,
            explanation,
            metadata,
            trace_timestamp,
            created_at: Utc::now(),
        }
    }

    pub fn errored(
        run_evaluator_id: RunEvaluatorId,
        trace_id: TraceId,
        span_id: Option<SpanId>,
        error: String,
        trace_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            run_evaluator_id,
            trace_id,
            span_id,
            score: None,
            error: Some(error),
            explanation: None,
            metadata: serde_json::Value::Null,
            trace_timestamp,
            created_at: Utc::now(),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_run() -> MonitorRun {
        MonitorRun {
            id: MonitorRunId::new(),
            monitor_id: MonitorId::new(),
            name: "test-run".into(),
            evaluators: vec![],
            trace_start: Utc::now(),
            trace_end: Utc::now(),
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn run_walks_pending_running_success() {
        let mut run = pending_run();
        run.start().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.started_at.is_some());
        run.succeed().unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.completed_at.is_some());
        assert!(run.status.is_terminal());
    }

    #[test]
    fn terminal_runs_reject_further_transitions() {
        let mut run = pending_run();
        run.start().unwrap();
        run.fail("trace source unavailable".into()).unwrap();
        assert!(run.succeed().is_err());
        assert!(run.fail("again".into()).is_err());
        assert_eq!(run.error_message.as_deref(), Some("trace source unavailable"));
    }

    #[test]
    fn pending_run_can_fail_directly() {
        // The stuck-run sweep fails pending runs that were never picked up.
        let mut run = pending_run();
        run.fail("run exceeded configured timeout".into()).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[test]
    fn succeed_requires_running() {
        let mut run = pending_run();
        assert!(run.succeed().is_err());
    }

    #[test]
    fn aggregations_over_scores() {
        let agg = Aggregations::compute(&[0.2, 0.4, 0.6, 0.8, 1.0]);
        assert!((agg.mean - 0.6).abs() < 1e-9);
        assert_eq!(agg.min, 0.2);
        assert_eq!(agg.max, 1.0);
        assert_eq!(agg.p50, 0.6);
        assert_eq!(agg.scored, 5);
    }

    #[test]
    fn aggregations_empty_is_zeroed() {
        assert_eq!(Aggregations::compute(&[]), Aggregations::default());
    }
}
