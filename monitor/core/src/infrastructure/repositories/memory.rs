// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! In-memory implementations of all three repository traits. All three share
//! one state block so the cross-aggregate operations (run creation + schedule
//! advancement, score + counter commit) stay atomic under the single lock,
//! matching the observable behavior of the Postgres transactions.
//!
//! Used for development mode and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::monitor::{Monitor, MonitorId, MonitorKind, OrgId};
use crate::domain::repository::{
    MonitorRepository, MonitorRunRepository, RepositoryError, ScoreRepository,
};
use crate::domain::run::{
    Aggregations, MonitorRun, MonitorRunId, RunEvaluator, RunEvaluatorId, RunStatus, Score,
};
use crate::domain::trace::{SpanId, TraceId};

#[derive(Clone, PartialEq, Eq, Hash)]
struct ScoreKey {
    run_evaluator_id: RunEvaluatorId,
    trace_id: TraceId,
    // `None` is an ordinary key value here, which is exactly the NULLS NOT
    // DISTINCT semantics the Postgres constraint provides.
    span_id: Option<SpanId>,
}

#[derive(Default)]
struct State {
    monitors: HashMap<MonitorId, Monitor>,
    runs: HashMap<MonitorRunId, MonitorRun>,
    run_evaluators: HashMap<RunEvaluatorId, RunEvaluator>,
    scores: HashMap<ScoreKey, Score>,
}

impl State {
    fn has_active_run(&self, monitor_id: MonitorId) -> bool {
        self.runs
            .values()
            .any(|r| r.monitor_id == monitor_id && !r.status.is_terminal())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unknown("Mutex poisoned".to_string()))
    }
}

#[async_trait]
impl MonitorRepository for InMemoryStore {
    async fn save(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.monitors.insert(monitor.id, monitor.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: MonitorId) -> Result<Option<Monitor>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.monitors.get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Monitor>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .monitors
            .values()
            .find(|m| m.org_id == org_id && m.name == name)
            .cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Monitor>, RepositoryError> {
        let state = self.lock()?;
        let mut due: Vec<Monitor> = state
            .monitors
            .values()
            .filter(|m| m.kind == MonitorKind::Future)
            .filter(|m| {
                m.schedule
                    .as_ref()
                    .is_some_and(|s| s.next_run_time <= now)
            })
            .filter(|m| !state.has_active_run(m.id))
            .cloned()
            .collect();
        due.sort_by_key(|m| m.schedule.as_ref().map(|s| s.next_run_time));
        Ok(due)
    }

    async fn delete(&self, id: MonitorId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.monitors.remove(&id).is_none() {
            return Err(RepositoryError::NotFound(format!("monitor {}", id.0)));
        }
        // Cascade: runs, aggregates, and scores of this monitor.
        let run_ids: Vec<MonitorRunId> = state
            .runs
            .values()
            .filter(|r| r.monitor_id == id)
            .map(|r| r.id)
            .collect();
        state.runs.retain(|_, r| r.monitor_id != id);
        let re_ids: Vec<RunEvaluatorId> = state
            .run_evaluators
            .values()
            .filter(|re| run_ids.contains(&re.monitor_run_id))
            .map(|re| re.id)
            .collect();
        state
            .run_evaluators
            .retain(|_, re| !run_ids.contains(&re.monitor_run_id));
        state
            .scores
            .retain(|key, _| !re_ids.contains(&key.run_evaluator_id));
        Ok(())
    }
}

#[async_trait]
impl MonitorRunRepository for InMemoryStore {
    async fn create_run_and_advance(
        &self,
        run: &MonitorRun,
        next_run_time: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        if state.has_active_run(run.monitor_id) {
            return Ok(false);
        }
        state.runs.insert(run.id, run.clone());
        if let Some(next_run_time) = next_run_time {
            if let Some(monitor) = state.monitors.get_mut(&run.monitor_id) {
                if let Some(schedule) = monitor.schedule.as_mut() {
                    schedule.next_run_time = next_run_time;
                }
            }
        }
        Ok(true)
    }

    async fn find_by_id(&self, id: MonitorRunId) -> Result<Option<MonitorRun>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.runs.get(&id).cloned())
    }

    async fn save(&self, run: &MonitorRun) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.runs.contains_key(&run.id) {
            return Err(RepositoryError::NotFound(format!("run {}", run.id.0)));
        }
        state.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn list_for_monitor(
        &self,
        monitor_id: MonitorId,
    ) -> Result<Vec<MonitorRun>, RepositoryError> {
        let state = self.lock()?;
        let mut runs: Vec<MonitorRun> = state
            .runs
            .values()
            .filter(|r| r.monitor_id == monitor_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn fail_stuck_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.lock()?;
        let mut swept = 0;
        for run in state.runs.values_mut() {
            let stuck = match run.status {
                RunStatus::Running => run.started_at.is_some_and(|t| t < cutoff),
                RunStatus::Pending => run.created_at < cutoff,
                _ => false,
            };
            if stuck && run.fail(message.to_string()).is_ok() {
                swept += 1;
            }
        }
        Ok(swept)
    }
}

#[async_trait]
impl ScoreRepository for InMemoryStore {
    async fn ensure_run_evaluator(
        &self,
        run_evaluator: &RunEvaluator,
    ) -> Result<RunEvaluatorId, RepositoryError> {
        let mut state = self.lock()?;
        let existing = state
            .run_evaluators
            .values()
            .find(|re| {
                re.monitor_run_id == run_evaluator.monitor_run_id
                    && re.display_name == run_evaluator.display_name
            })
            .map(|re| re.id);
        if let Some(id) = existing {
            return Ok(id);
        }
        state
            .run_evaluators
            .insert(run_evaluator.id, run_evaluator.clone());
        Ok(run_evaluator.id)
    }

    async fn record_score(&self, score: &Score) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let key = ScoreKey {
            run_evaluator_id: score.run_evaluator_id,
            trace_id: score.trace_id.clone(),
            span_id: score.span_id.clone(),
        };
        let prior = state.scores.insert(key, score.clone());
        let run_evaluator = state
            .run_evaluators
            .get_mut(&score.run_evaluator_id)
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("run evaluator {}", score.run_evaluator_id.0))
            })?;
        let new_errored = score.is_errored() as i64;
        match prior {
            None => {
                run_evaluator.count += 1;
                run_evaluator.error_count += new_errored;
            }
            Some(old) => {
                run_evaluator.error_count += new_errored - old.is_errored() as i64;
            }
        }
        Ok(())
    }

    async fn score_values(&self, id: RunEvaluatorId) -> Result<Vec<f64>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .scores
            .iter()
            .filter(|(key, _)| key.run_evaluator_id == id)
            .filter_map(|(_, s)| s.score)
            .collect())
    }

    async fn write_aggregations(
        &self,
        id: RunEvaluatorId,
        aggregations: &Aggregations,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let run_evaluator = state
            .run_evaluators
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("run evaluator {}", id.0)))?;
        run_evaluator.aggregations = aggregations.clone();
        Ok(())
    }

    async fn run_evaluators_for_run(
        &self,
        run_id: MonitorRunId,
    ) -> Result<Vec<RunEvaluator>, RepositoryError> {
        let state = self.lock()?;
        let mut evaluators: Vec<RunEvaluator> = state
            .run_evaluators
            .values()
            .filter(|re| re.monitor_run_id == run_id)
            .cloned()
            .collect();
        evaluators.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(evaluators)
    }

    async fn scores_for_run_evaluator(
        &self,
        id: RunEvaluatorId,
    ) -> Result<Vec<Score>, RepositoryError> {
        let state = self.lock()?;
        let mut scores: Vec<Score> = state
            .scores
            .iter()
            .filter(|(key, _)| key.run_evaluator_id == id)
            .map(|(_, s)| s.clone())
            .collect();
        scores.sort_by_key(|s| s.trace_timestamp);
        Ok(scores)
    }
}
