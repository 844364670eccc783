// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::monitor::{EvaluatorSpec, MonitorId};
use crate::domain::repository::{MonitorRunRepository, RepositoryError};
use crate::domain::run::{MonitorRun, MonitorRunId, RunStatus};

pub struct PostgresRunRepository {
    pool: PgPool,
}

impl PostgresRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_from_str(status: &str) -> RunStatus {
    match status {
        "running" => RunStatus::Running,
        "success" => RunStatus::Success,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Pending,
    }
}

fn run_from_row(row: &PgRow) -> Result<MonitorRun, RepositoryError> {
    let status_str: String = row.get("status");
    let evaluators_val: serde_json::Value = row.get("evaluators");
    let evaluators: Vec<EvaluatorSpec> = serde_json::from_value(evaluators_val)
        .map_err(|e| RepositoryError::Serialization(format!("evaluators column: {}", e)))?;

    Ok(MonitorRun {
        id: MonitorRunId(row.get("id")),
        monitor_id: MonitorId(row.get("monitor_id")),
        name: row.get("name"),
        evaluators,
        trace_start: row.get("trace_start"),
        trace_end: row.get("trace_end"),
        status: status_from_str(&status_str),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
    })
}

const RUN_COLUMNS: &str = "id, monitor_id, name, evaluators, trace_start, trace_end, status, \
     started_at, completed_at, error_message, created_at";

#[async_trait]
impl MonitorRunRepository for PostgresRunRepository {
    async fn create_run_and_advance(
        &self,
        run: &MonitorRun,
        next_run_time: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        let evaluators_json = serde_json::to_value(&run.evaluators)?;
        let mut tx = self.pool.begin().await?;

        // The insert itself re-checks the no-active-run condition, so a
        // racing replica's concurrent tick inserts nothing here.
        let inserted = sqlx::query(
            r#"
            INSERT INTO monitor_runs (
                id, monitor_id, name, evaluators, trace_start, trace_end,
                status, created_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE NOT EXISTS (
                SELECT 1 FROM monitor_runs
                WHERE monitor_id = $2 AND status IN ('pending', 'running')
            )
            "#,
        )
        .bind(run.id.0)
        .bind(run.monitor_id.0)
        .bind(&run.name)
        .bind(evaluators_json)
        .bind(run.trace_start)
        .bind(run.trace_end)
        .bind(run.status.as_str())
        .bind(run.created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(next_run_time) = next_run_time {
            sqlx::query("UPDATE monitors SET next_run_time = $1 WHERE id = $2")
                .bind(next_run_time)
                .bind(run.monitor_id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn find_by_id(&self, id: MonitorRunId) -> Result<Option<MonitorRun>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM monitor_runs WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(run_from_row).transpose()
    }

    async fn save(&self, run: &MonitorRun) -> Result<(), RepositoryError> {
        // Creation goes through create_run_and_advance; save only moves a
        // run along its state machine.
        let updated = sqlx::query(
            r#"
            UPDATE monitor_runs SET
                status = $2,
                started_at = $3,
                completed_at = $4,
                error_message = $5
            WHERE id = $1
            "#,
        )
        .bind(run.id.0)
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("run {}", run.id.0)));
        }
        Ok(())
    }

    async fn list_for_monitor(
        &self,
        monitor_id: MonitorId,
    ) -> Result<Vec<MonitorRun>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM monitor_runs WHERE monitor_id = $1 ORDER BY created_at DESC"
        ))
        .bind(monitor_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect()
    }

    async fn fail_stuck_runs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, RepositoryError> {
        let swept = sqlx::query(
            r#"
            UPDATE monitor_runs SET
                status = 'failed',
                error_message = $2,
                completed_at = NOW()
            WHERE (status = 'running' AND started_at < $1)
               OR (status = 'pending' AND created_at < $1)
            "#,
        )
        .bind(cutoff)
        .bind(message)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(swept)
    }
}
