// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Idempotent schema creation for the four monitor tables.
//!
//! The `scores` uniqueness constraint uses `NULLS NOT DISTINCT` so an absent
//! `span_id` is one equivalence class: re-scoring a trace-level item upserts
//! instead of inserting a duplicate. Requires PostgreSQL 15+.

use sqlx::postgres::PgPool;

use crate::domain::repository::RepositoryError;

pub struct Schema;

impl Schema {
    pub async fn migrate(pool: &PgPool) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monitors (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                display_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                org_id UUID NOT NULL,
                project_id UUID NOT NULL,
                agent_id UUID NOT NULL,
                environment_id UUID NOT NULL,
                evaluators JSONB NOT NULL,
                interval_minutes BIGINT,
                next_run_time TIMESTAMPTZ,
                trace_start TIMESTAMPTZ,
                trace_end TIMESTAMPTZ,
                sampling_rate DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (org_id, name)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monitor_runs (
                id UUID PRIMARY KEY,
                monitor_id UUID NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                evaluators JSONB NOT NULL,
                trace_start TIMESTAMPTZ NOT NULL,
                trace_end TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                started_at TIMESTAMPTZ,
                completed_at TIMESTAMPTZ,
                error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Partial index backing the due-selection anti-join and the
        // active-run check.
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_monitor_runs_active
            ON monitor_runs (monitor_id)
            WHERE status IN ('pending', 'running')
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monitor_run_evaluators (
                id UUID PRIMARY KEY,
                monitor_run_id UUID NOT NULL REFERENCES monitor_runs(id) ON DELETE CASCADE,
                display_name TEXT NOT NULL,
                level TEXT NOT NULL,
                aggregations JSONB NOT NULL DEFAULT '{}'::jsonb,
                count BIGINT NOT NULL DEFAULT 0,
                error_count BIGINT NOT NULL DEFAULT 0,
                UNIQUE (monitor_run_id, display_name)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scores (
                id UUID PRIMARY KEY,
                run_evaluator_id UUID NOT NULL REFERENCES monitor_run_evaluators(id) ON DELETE CASCADE,
                trace_id TEXT NOT NULL,
                span_id TEXT,
                score DOUBLE PRECISION,
                error TEXT,
                explanation TEXT,
                metadata JSONB NOT NULL DEFAULT 'null'::jsonb,
                trace_timestamp TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                CONSTRAINT scores_item_key
                    UNIQUE NULLS NOT DISTINCT (run_evaluator_id, trace_id, span_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_scores_trace_timestamp
            ON scores (run_evaluator_id, trace_timestamp)
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}
