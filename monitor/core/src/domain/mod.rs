// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

pub mod monitor;
pub mod run;
pub mod trace;
pub mod evaluator;
pub mod repository;

pub use monitor::{Monitor, MonitorId, MonitorKind, MonitorSchedule, MonitorRange, EvaluatorSpec, OrgId, ProjectId, AgentId, EnvironmentId};
pub use run::{MonitorRun, MonitorRunId, RunStatus, RunEvaluator, RunEvaluatorId, EvaluatorLevel, Score, Aggregations};
pub use trace::{Trace, Span, TraceId, SpanId, AgentScope, TraceSource, TraceStream, TraceSourceError};
pub use evaluator::{Evaluator, EvalItem, EvalScore, EvaluatorError, EvaluatorConfig, ConfigValue, ParamDef, ParamType, ConfigValidationError};
pub use repository::{RepositoryError, MonitorRepository, MonitorRunRepository, ScoreRepository};
