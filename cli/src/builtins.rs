// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Compiled-in evaluators and the factory that dispatches seeded definitions
//! to them by provider name.

use std::sync::Arc;

use argus_core::application::catalog::{EvaluatorDefinition, EvaluatorFactory};
use argus_core::domain::evaluator::{
    Evaluator, KeywordScanEvaluator, LatencyBudgetEvaluator, ParamDef, ParamType,
};
use argus_core::domain::run::EvaluatorLevel;

pub struct BuiltinEvaluatorFactory;

impl EvaluatorFactory for BuiltinEvaluatorFactory {
    fn build(&self, provider: &str) -> Option<Arc<dyn Evaluator>> {
        match provider {
            "latency_budget" => Some(Arc::new(LatencyBudgetEvaluator)),
            "keyword_scan" => Some(Arc::new(KeywordScanEvaluator)),
            _ => None,
        }
    }
}

/// Definitions for the compiled-in evaluators. Registered before any seed
/// file, so a seed entry with the same identifier and version wins.
pub fn builtin_definitions() -> Vec<EvaluatorDefinition> {
    vec![
        EvaluatorDefinition {
            identifier: "latency-budget".to_string(),
            version: "1.0".to_string(),
            display_name: "Latency Budget".to_string(),
            description: "Scores traces against a wall-clock duration budget".to_string(),
            tags: vec!["performance".to_string()],
            level: EvaluatorLevel::Trace,
            config_schema: vec![ParamDef {
                name: "budget_ms".to_string(),
                param_type: ParamType::Number,
                required: true,
            }],
            provider: "latency_budget".to_string(),
        },
        EvaluatorDefinition {
            identifier: "keyword-scan".to_string(),
            version: "1.0".to_string(),
            display_name: "Keyword Scan".to_string(),
            description: "Flags spans whose attributes contain configured terms".to_string(),
            tags: vec!["safety".to_string()],
            level: EvaluatorLevel::Span,
            config_schema: vec![ParamDef {
                name: "terms".to_string(),
                param_type: ParamType::String,
                required: true,
            }],
            provider: "keyword_scan".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_definition_has_a_provider() {
        let factory = BuiltinEvaluatorFactory;
        for definition in builtin_definitions() {
            assert!(
                factory.build(&definition.provider).is_some(),
                "no implementation for {}",
                definition.provider
            );
        }
    }

    #[test]
    fn unknown_provider_yields_none() {
        assert!(BuiltinEvaluatorFactory.build("llm_judge").is_none());
    }
}
