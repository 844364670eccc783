// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::monitor::{
    AgentId, EnvironmentId, EvaluatorSpec, Monitor, MonitorId, MonitorKind, MonitorRange,
    MonitorSchedule, OrgId, ProjectId,
};
use crate::domain::repository::{MonitorRepository, RepositoryError};

pub struct PostgresMonitorRepository {
    pool: PgPool,
}

impl PostgresMonitorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MONITOR_COLUMNS: &str = "id, name, display_name, kind, org_id, project_id, agent_id, \
     environment_id, evaluators, interval_minutes, next_run_time, trace_start, trace_end, \
     sampling_rate, created_at";

pub(crate) fn monitor_from_row(row: &PgRow) -> Result<Monitor, RepositoryError> {
    let kind_str: String = row.get("kind");
    let kind = match kind_str.as_str() {
        "past" => MonitorKind::Past,
        _ => MonitorKind::Future,
    };

    let evaluators_val: serde_json::Value = row.get("evaluators");
    let evaluators: Vec<EvaluatorSpec> = serde_json::from_value(evaluators_val)
        .map_err(|e| RepositoryError::Serialization(format!("evaluators column: {}", e)))?;

    let interval_minutes: Option<i64> = row.get("interval_minutes");
    let next_run_time: Option<DateTime<Utc>> = row.get("next_run_time");
    let schedule = match (kind, interval_minutes, next_run_time) {
        (MonitorKind::Future, Some(interval_minutes), Some(next_run_time)) => {
            Some(MonitorSchedule {
                interval_minutes,
                next_run_time,
            })
        }
        _ => None,
    };

    let trace_start: Option<DateTime<Utc>> = row.get("trace_start");
    let trace_end: Option<DateTime<Utc>> = row.get("trace_end");
    let range = match (kind, trace_start, trace_end) {
        (MonitorKind::Past, Some(trace_start), Some(trace_end)) => Some(MonitorRange {
            trace_start,
            trace_end,
        }),
        _ => None,
    };

    Ok(Monitor {
        id: MonitorId(row.get("id")),
        name: row.get("name"),
        display_name: row.get("display_name"),
        kind,
        org_id: OrgId(row.get("org_id")),
        project_id: ProjectId(row.get("project_id")),
        agent_id: AgentId(row.get("agent_id")),
        environment_id: EnvironmentId(row.get("environment_id")),
        evaluators,
        schedule,
        range,
        sampling_rate: row.get("sampling_rate"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl MonitorRepository for PostgresMonitorRepository {
    async fn save(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        let evaluators_json = serde_json::to_value(&monitor.evaluators)?;
        let (interval_minutes, next_run_time) = match &monitor.schedule {
            Some(s) => (Some(s.interval_minutes), Some(s.next_run_time)),
            None => (None, None),
        };
        let (trace_start, trace_end) = match &monitor.range {
            Some(r) => (Some(r.trace_start), Some(r.trace_end)),
            None => (None, None),
        };

        // The range of a past monitor is immutable once created, so the
        // conflict arm leaves trace_start/trace_end alone.
        sqlx::query(
            r#"
            INSERT INTO monitors (
                id, name, display_name, kind, org_id, project_id, agent_id,
                environment_id, evaluators, interval_minutes, next_run_time,
                trace_start, trace_end, sampling_rate, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                evaluators = EXCLUDED.evaluators,
                interval_minutes = EXCLUDED.interval_minutes,
                next_run_time = EXCLUDED.next_run_time,
                sampling_rate = EXCLUDED.sampling_rate
            "#,
        )
        .bind(monitor.id.0)
        .bind(&monitor.name)
        .bind(&monitor.display_name)
        .bind(monitor.kind.as_str())
        .bind(monitor.org_id.0)
        .bind(monitor.project_id.0)
        .bind(monitor.agent_id.0)
        .bind(monitor.environment_id.0)
        .bind(evaluators_json)
        .bind(interval_minutes)
        .bind(next_run_time)
        .bind(trace_start)
        .bind(trace_end)
        .bind(monitor.sampling_rate)
        .bind(monitor.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save monitor: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: MonitorId) -> Result<Option<Monitor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(monitor_from_row).transpose()
    }

    async fn find_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Monitor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors WHERE org_id = $1 AND name = $2"
        ))
        .bind(org_id.0)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(monitor_from_row).transpose()
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Monitor>, RepositoryError> {
        // The anti-join is the at-most-one-active-run guarantee's first half;
        // create_run_and_advance re-checks inside its transaction.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MONITOR_COLUMNS} FROM monitors m
            WHERE m.kind = 'future'
              AND m.next_run_time <= $1
              AND NOT EXISTS (
                  SELECT 1 FROM monitor_runs r
                  WHERE r.monitor_id = m.id AND r.status IN ('pending', 'running')
              )
            ORDER BY m.next_run_time
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(monitor_from_row).collect()
    }

    async fn delete(&self, id: MonitorId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM monitors WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
