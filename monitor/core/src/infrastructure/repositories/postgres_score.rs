// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::repository::{RepositoryError, ScoreRepository};
use crate::domain::run::{
    Aggregations, EvaluatorLevel, MonitorRunId, RunEvaluator, RunEvaluatorId, Score,
};
use crate::domain::trace::{SpanId, TraceId};

pub struct PostgresScoreRepository {
    pool: PgPool,
}

impl PostgresScoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn level_from_str(level: &str) -> EvaluatorLevel {
    match level {
        "agent" => EvaluatorLevel::Agent,
        "span" => EvaluatorLevel::Span,
        _ => EvaluatorLevel::Trace,
    }
}

fn run_evaluator_from_row(row: &PgRow) -> Result<RunEvaluator, RepositoryError> {
    let level_str: String = row.get("level");
    let aggregations_val: serde_json::Value = row.get("aggregations");
    let aggregations: Aggregations = serde_json::from_value(aggregations_val)
        .map_err(|e| RepositoryError::Serialization(format!("aggregations column: {}", e)))?;

    Ok(RunEvaluator {
        id: RunEvaluatorId(row.get("id")),
        monitor_run_id: MonitorRunId(row.get("monitor_run_id")),
        display_name: row.get("display_name"),
        level: level_from_str(&level_str),
        aggregations,
        count: row.get("count"),
        error_count: row.get("error_count"),
    })
}

fn score_from_row(row: &PgRow) -> Score {
    let span_id: Option<String> = row.get("span_id");
    Score {
        run_evaluator_id: RunEvaluatorId(row.get("run_evaluator_id")),
        trace_id: TraceId(row.get("trace_id")),
        span_id: span_id.map(SpanId),
        score: row.get("score"),
        error: row.get("error"),
        explanation: row.get("explanation"),
        metadata: row.get("metadata"),
        trace_timestamp: row.get("trace_timestamp"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ScoreRepository for PostgresScoreRepository {
    async fn ensure_run_evaluator(
        &self,
        run_evaluator: &RunEvaluator,
    ) -> Result<RunEvaluatorId, RepositoryError> {
        let aggregations_json = serde_json::to_value(&run_evaluator.aggregations)?;
        // The no-op conflict arm exists so RETURNING yields the surviving
        // row's id for racing creators.
        let row = sqlx::query(
            r#"
            INSERT INTO monitor_run_evaluators (
                id, monitor_run_id, display_name, level, aggregations, count, error_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (monitor_run_id, display_name)
                DO UPDATE SET level = EXCLUDED.level
            RETURNING id
            "#,
        )
        .bind(run_evaluator.id.0)
        .bind(run_evaluator.monitor_run_id.0)
        .bind(&run_evaluator.display_name)
        .bind(run_evaluator.level.as_str())
        .bind(aggregations_json)
        .bind(run_evaluator.count)
        .bind(run_evaluator.error_count)
        .fetch_one(&self.pool)
        .await?;

        Ok(RunEvaluatorId(row.get("id")))
    }

    async fn record_score(&self, score: &Score) -> Result<(), RepositoryError> {
        let span_id = score.span_id.as_ref().map(|s| s.0.as_str());
        let mut tx = self.pool.begin().await?;

        // Lock the prior row (if any) so the counter movement below sees a
        // stable before-state under concurrent item writers.
        let prior = sqlx::query(
            r#"
            SELECT error FROM scores
            WHERE run_evaluator_id = $1
              AND trace_id = $2
              AND span_id IS NOT DISTINCT FROM $3
            FOR UPDATE
            "#,
        )
        .bind(score.run_evaluator_id.0)
        .bind(&score.trace_id.0)
        .bind(span_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO scores (
                id, run_evaluator_id, trace_id, span_id, score, error,
                explanation, metadata, trace_timestamp, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT ON CONSTRAINT scores_item_key DO UPDATE SET
                score = EXCLUDED.score,
                error = EXCLUDED.error,
                explanation = EXCLUDED.explanation,
                metadata = EXCLUDED.metadata,
                trace_timestamp = EXCLUDED.trace_timestamp,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(score.run_evaluator_id.0)
        .bind(&score.trace_id.0)
        .bind(span_id)
        .bind(score.score)
        .bind(&score.error)
        .bind(&score.explanation)
        .bind(&score.metadata)
        .bind(score.trace_timestamp)
        .bind(score.created_at)
        .execute(&mut *tx)
        .await?;

        // A fresh item counts once; a replacement only moves error_count by
        // the difference, so retries never inflate `count`.
        let new_errored = score.is_errored() as i64;
        let (count_delta, error_delta) = match prior {
            None => (1i64, new_errored),
            Some(row) => {
                let old_error: Option<String> = row.get("error");
                (0, new_errored - old_error.is_some() as i64)
            }
        };
        sqlx::query(
            r#"
            UPDATE monitor_run_evaluators
            SET count = count + $2, error_count = error_count + $3
            WHERE id = $1
            "#,
        )
        .bind(score.run_evaluator_id.0)
        .bind(count_delta)
        .bind(error_delta)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn score_values(&self, id: RunEvaluatorId) -> Result<Vec<f64>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT score FROM scores WHERE run_evaluator_id = $1 AND score IS NOT NULL",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("score")).collect())
    }

    async fn write_aggregations(
        &self,
        id: RunEvaluatorId,
        aggregations: &Aggregations,
    ) -> Result<(), RepositoryError> {
        let aggregations_json = serde_json::to_value(aggregations)?;
        sqlx::query("UPDATE monitor_run_evaluators SET aggregations = $2 WHERE id = $1")
            .bind(id.0)
            .bind(aggregations_json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn run_evaluators_for_run(
        &self,
        run_id: MonitorRunId,
    ) -> Result<Vec<RunEvaluator>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, monitor_run_id, display_name, level, aggregations, count, error_count
            FROM monitor_run_evaluators
            WHERE monitor_run_id = $1
            ORDER BY display_name
            "#,
        )
        .bind(run_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_evaluator_from_row).collect()
    }

    async fn scores_for_run_evaluator(
        &self,
        id: RunEvaluatorId,
    ) -> Result<Vec<Score>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT run_evaluator_id, trace_id, span_id, score, error, explanation,
                   metadata, trace_timestamp, created_at
            FROM scores
            WHERE run_evaluator_id = $1
            ORDER BY trace_timestamp
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(score_from_row).collect())
    }
}
