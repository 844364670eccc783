// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! The evaluator contract.
//!
//! Evaluators are pluggable capabilities keyed by `(identifier, version)` in
//! the catalog. This module defines the invocation seam, the typed
//! configuration schema checked at monitor-creation time, and two reference
//! evaluators the platform ships as builtins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::trace::{Span, SpanId, Trace, TraceId};

/// Typed key-value configuration attached to one evaluator selection.
pub type EvaluatorConfig = BTreeMap<String, ConfigValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Declared type of one configuration parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Bool,
    Enum { choices: Vec<String> },
}

/// One entry of an evaluator's declared parameter list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(flatten)]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("missing required parameter '{0}'")]
    MissingParam(String),

    #[error("parameter '{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("parameter '{name}' must be one of {choices:?}, got '{actual}'")]
    InvalidChoice {
        name: String,
        choices: Vec<String>,
        actual: String,
    },

    #[error("unknown parameter '{0}'")]
    UnknownParam(String),
}

/// Checks a monitor's evaluator config against the declared schema. Runs at
/// monitor-creation time so malformed configs never reach execution.
pub fn validate_config(
    schema: &[ParamDef],
    config: &EvaluatorConfig,
) -> Result<(), ConfigValidationError> {
    for def in schema {
        match config.get(&def.name) {
            None => {
                if def.required {
                    return Err(ConfigValidationError::MissingParam(def.name.clone()));
                }
            }
            Some(value) => check_value(def, value)?,
        }
    }
    for key in config.keys() {
        if !schema.iter().any(|d| &d.name == key) {
            return Err(ConfigValidationError::UnknownParam(key.clone()));
        }
    }
    Ok(())
}

fn check_value(def: &ParamDef, value: &ConfigValue) -> Result<(), ConfigValidationError> {
    let mismatch = |expected: &'static str| ConfigValidationError::TypeMismatch {
        name: def.name.clone(),
        expected,
        actual: value.type_name(),
    };
    match (&def.param_type, value) {
        (ParamType::String, ConfigValue::String(_)) => Ok(()),
        (ParamType::Number, ConfigValue::Number(_)) => Ok(()),
        (ParamType::Bool, ConfigValue::Bool(_)) => Ok(()),
        (ParamType::Enum { choices }, ConfigValue::String(s)) => {
            if choices.contains(s) {
                Ok(())
            } else {
                Err(ConfigValidationError::InvalidChoice {
                    name: def.name.clone(),
                    choices: choices.clone(),
                    actual: s.clone(),
                })
            }
        }
        (ParamType::String, _) | (ParamType::Enum { .. }, _) => Err(mismatch("string")),
        (ParamType::Number, _) => Err(mismatch("number")),
        (ParamType::Bool, _) => Err(mismatch("bool")),
    }
}

/// The item handed to one evaluator invocation, at its declared level.
#[derive(Debug, Clone, Copy)]
pub enum EvalItem<'a> {
    Trace(&'a Trace),
    Span { trace: &'a Trace, span: &'a Span },
}

impl<'a> EvalItem<'a> {
    pub fn trace(&self) -> &'a Trace {
        match self {
            EvalItem::Trace(t) => t,
            EvalItem::Span { trace, .. } => trace,
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace().id
    }

    pub fn span_id(&self) -> Option<&SpanId> {
        match self {
            EvalItem::Trace(_) => None,
            EvalItem::Span { span, .. } => Some(&span.id),
        }
    }

    /// Stable identity used for the deterministic sampling decision.
    pub fn sample_key(&self) -> String {
        match self {
            EvalItem::Trace(t) => t.id.0.clone(),
            EvalItem::Span { trace, span } => format!("{}/{}", trace.id.0, span.id.0),
        }
    }
}

/// A successful evaluation: a score in [0, 1] with optional context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalScore {
    pub score: f64,
    pub explanation: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluator execution failed: {0}")]
    Execution(String),

    #[error("Evaluator timed out after {0}s")]
    Timeout(u64),
}

/// A pluggable scoring capability. Implementations may call out to LLM
/// judges, run local heuristics, or proxy user-registered endpoints; the
/// executor treats them uniformly.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        item: &EvalItem<'_>,
        config: &EvaluatorConfig,
    ) -> Result<EvalScore, EvaluatorError>;
}

/// Trace-level builtin: scores how far a trace's wall-clock duration stays
/// within a configured budget. Reads the `duration_ms` trace attribute.
pub struct LatencyBudgetEvaluator;

#[async_trait]
impl Evaluator for LatencyBudgetEvaluator {
    async fn evaluate(
        &self,
        item: &EvalItem<'_>,
        config: &EvaluatorConfig,
    ) -> Result<EvalScore, EvaluatorError> {
        let budget_ms = config
            .get("budget_ms")
            .and_then(ConfigValue::as_number)
            .ok_or_else(|| EvaluatorError::Execution("budget_ms not configured".into()))?;
        let duration_ms = item
            .trace()
            .attributes
            .get("duration_ms")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                EvaluatorError::Execution("trace has no duration_ms attribute".into())
            })?;
        if budget_ms <= 0.0 {
            return Err(EvaluatorError::Execution("budget_ms must be positive".into()));
        }
        // 1.0 within budget, degrading proportionally beyond it.
        let score = (budget_ms / duration_ms.max(budget_ms)).clamp(0.0, 1.0);
        Ok(EvalScore {
            score,
            explanation: Some(format!("{duration_ms}ms against a {budget_ms}ms budget")),
            metadata: serde_json::json!({ "duration_ms": duration_ms }),
        })
    }
}

/// Span-level builtin: flags spans whose attributes contain any of the
/// configured terms. Score 1.0 when clean, 0.0 on any match.
pub struct KeywordScanEvaluator;

#[async_trait]
impl Evaluator for KeywordScanEvaluator {
    async fn evaluate(
        &self,
        item: &EvalItem<'_>,
        config: &EvaluatorConfig,
    ) -> Result<EvalScore, EvaluatorError> {
        let terms = config
            .get("terms")
            .and_then(ConfigValue::as_str)
            .ok_or_else(|| EvaluatorError::Execution("terms not configured".into()))?;
        let haystack = match item {
            EvalItem::Span { span, .. } => span.attributes.to_string().to_lowercase(),
            EvalItem::Trace(trace) => trace.attributes.to_string().to_lowercase(),
        };
        let matched: Vec<&str> = terms
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty() && haystack.contains(&t.to_lowercase()))
            .collect();
        if matched.is_empty() {
            Ok(EvalScore {
                score: 1.0,
                explanation: None,
                metadata: serde_json::Value::Null,
            })
        } else {
            Ok(EvalScore {
                score: 0.0,
                explanation: Some(format!("matched terms: {}", matched.join(", "))),
                metadata: serde_json::json!({ "matched": matched }),
            })
        }
    }
}
