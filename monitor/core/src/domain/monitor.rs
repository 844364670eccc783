// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::evaluator::EvaluatorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(pub Uuid);

impl MonitorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

// Scope references are owned by the platform's control plane, not by this
// subsystem. They are carried verbatim for the trace query and catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    /// Recurring, forward-looking evaluation on a fixed interval.
    Future,
    /// One-shot backfill over a fixed historical range.
    Past,
}

impl MonitorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorKind::Future => "future",
            MonitorKind::Past => "past",
        }
    }
}

/// Snapshot of one evaluator selection on a monitor: which evaluator, which
/// version, and the configuration it runs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorSpec {
    pub identifier: String,
    pub version: String,
    pub config: EvaluatorConfig,
}

impl EvaluatorSpec {
    /// Display name used as the per-run aggregate key.
    pub fn display_name(&self) -> String {
        format!("{}@{}", self.identifier, self.version)
    }
}

/// Scheduling state for `future` monitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSchedule {
    pub interval_minutes: i64,
    pub next_run_time: DateTime<Utc>,
}

/// Fixed historical range for `past` monitors. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRange {
    pub trace_start: DateTime<Utc>,
    pub trace_end: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("sampling rate {0} outside (0, 1]")]
    InvalidSamplingRate(f64),

    #[error("interval must be at least one minute, got {0}")]
    InvalidInterval(i64),

    #[error("trace range is empty or inverted")]
    InvalidRange,

    #[error("monitor has no evaluators")]
    NoEvaluators,

    #[error("monitor kind {0} is missing its {1}")]
    KindFieldsMismatch(&'static str, &'static str),
}

/// A named evaluation policy: which evaluators to run against an agent's
/// traces, how often (or over which historical range), and at what sampling
/// rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub name: String,
    pub display_name: String,
    pub kind: MonitorKind,
    pub org_id: OrgId,
    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub environment_id: EnvironmentId,
    pub evaluators: Vec<EvaluatorSpec>,
    /// Populated iff `kind == Future`.
    pub schedule: Option<MonitorSchedule>,
    /// Populated iff `kind == Past`.
    pub range: Option<MonitorRange>,
    pub sampling_rate: f64,
    pub created_at: DateTime<Utc>,
}

impl Monitor {
    pub fn future(
        name: String,
        display_name: String,
        org_id: OrgId,
        project_id: ProjectId,
        agent_id: AgentId,
        environment_id: EnvironmentId,
        evaluators: Vec<EvaluatorSpec>,
        interval_minutes: i64,
        sampling_rate: f64,
    ) -> Result<Self, MonitorError> {
        if interval_minutes < 1 {
            return Err(MonitorError::InvalidInterval(interval_minutes));
        }
        let now = Utc::now();
        let monitor = Self {
            id: MonitorId::new(),
            name,
            display_name,
            kind: MonitorKind::Future,
            org_id,
            project_id,
            agent_id,
            environment_id,
            evaluators,
            schedule: Some(MonitorSchedule {
                interval_minutes,
                // First run becomes due one full interval after creation so the
                // initial window is fully in the past.
                next_run_time: now + Duration::minutes(interval_minutes),
            }),
            range: None,
            sampling_rate,
            created_at: now,
        };
        monitor.validate()?;
        Ok(monitor)
    }

    pub fn past(
        name: String,
        display_name: String,
        org_id: OrgId,
        project_id: ProjectId,
        agent_id: AgentId,
        environment_id: EnvironmentId,
        evaluators: Vec<EvaluatorSpec>,
        trace_start: DateTime<Utc>,
        trace_end: DateTime<Utc>,
        sampling_rate: f64,
    ) -> Result<Self, MonitorError> {
        if trace_end <= trace_start {
            return Err(MonitorError::InvalidRange);
        }
        let monitor = Self {
            id: MonitorId::new(),
            name,
            display_name,
            kind: MonitorKind::Past,
            org_id,
            project_id,
            agent_id,
            environment_id,
            evaluators,
            schedule: None,
            range: Some(MonitorRange {
                trace_start,
                trace_end,
            }),
            sampling_rate,
            created_at: Utc::now(),
        };
        monitor.validate()?;
        Ok(monitor)
    }

    /// Invariant check: exactly one of {schedule, range} is populated,
    /// determined by `kind`, and the sampling rate is in (0, 1].
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !(self.sampling_rate > 0.0 && self.sampling_rate <= 1.0) {
            return Err(MonitorError::InvalidSamplingRate(self.sampling_rate));
        }
        if self.evaluators.is_empty() {
            return Err(MonitorError::NoEvaluators);
        }
        match self.kind {
            MonitorKind::Future => {
                if self.schedule.is_none() {
                    return Err(MonitorError::KindFieldsMismatch("future", "schedule"));
                }
                if self.range.is_some() {
                    return Err(MonitorError::KindFieldsMismatch("future", "empty range"));
                }
            }
            MonitorKind::Past => {
                if self.range.is_none() {
                    return Err(MonitorError::KindFieldsMismatch("past", "range"));
                }
                if self.schedule.is_some() {
                    return Err(MonitorError::KindFieldsMismatch("past", "empty schedule"));
                }
            }
        }
        Ok(())
    }

    pub fn scope(&self) -> crate::domain::trace::AgentScope {
        crate::domain::trace::AgentScope {
            org_id: self.org_id,
            project_id: self.project_id,
            agent_id: self.agent_id,
            environment_id: self.environment_id,
        }
    }

    /// Trace window for a run dispatched at `now`.
    ///
    /// For `future` monitors windows tile the timeline without holes: the
    /// window starts one interval before the due time (the point the previous
    /// window ended at) and closes at `now`. For `past` monitors the stored
    /// range is used verbatim.
    pub fn next_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match (&self.schedule, &self.range) {
            (Some(schedule), _) => {
                let start = schedule.next_run_time - Duration::minutes(schedule.interval_minutes);
                (start.min(now), now)
            }
            (None, Some(range)) => (range.trace_start, range.trace_end),
            // validate() forbids this shape; fall back to an empty window.
            (None, None) => (now, now),
        }
    }

    /// Schedule position after a run dispatched at `now`.
    pub fn advanced_next_run_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .as_ref()
            .map(|s| now + Duration::minutes(s.interval_minutes))
    }
}
