// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Recorded agent executions as served by the trace store.
//!
//! The trace store is an external collaborator; this module only models the
//! shape the executor consumes and the streaming seam it consumes it through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

use crate::domain::monitor::{AgentId, EnvironmentId, OrgId, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(pub String);

/// A recorded agent execution: the unit trace-level evaluators score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: TraceId,
    pub timestamp: DateTime<Utc>,
    pub spans: Vec<Span>,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// A sub-unit of a trace: the unit span-level evaluators score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: SpanId,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// Identifies whose traces a window query is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentScope {
    pub org_id: OrgId,
    pub project_id: ProjectId,
    pub agent_id: AgentId,
    pub environment_id: EnvironmentId,
}

#[derive(Debug, Error)]
pub enum TraceSourceError {
    #[error("Trace query failed: {0}")]
    Query(String),

    #[error("Trace response malformed: {0}")]
    Malformed(String),
}

/// Lazy, finite, non-restartable sequence of traces for one window.
pub type TraceStream = Pin<Box<dyn Stream<Item = Result<Trace, TraceSourceError>> + Send>>;

/// The trace store seam. Implementations page or stream; the executor never
/// holds a whole window in memory.
#[async_trait]
pub trait TraceSource: Send + Sync {
    async fn fetch(
        &self,
        scope: &AgentScope,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<TraceStream, TraceSourceError>;
}
