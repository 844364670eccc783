// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Evaluator Catalog
//!
//! Read-mostly registry mapping `(identifier, version, org scope)` to an
//! evaluator's definition and dispatch handle. Builtins are global
//! (`org = None`); an organization-scoped registration with the same
//! identifier/version shadows the builtin for that organization.
//!
//! Registration is an upsert on the key triple, so re-registering the same
//! evaluator updates display metadata without creating a duplicate.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::evaluator::{validate_config, ConfigValidationError, Evaluator, ParamDef};
use crate::domain::monitor::{EvaluatorSpec, OrgId};
use crate::domain::run::EvaluatorLevel;

/// Catalog-side description of one evaluator: display metadata, granularity,
/// and the declared configuration schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorDefinition {
    pub identifier: String,
    pub version: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub level: EvaluatorLevel,
    #[serde(default)]
    pub config_schema: Vec<ParamDef>,
    /// Dispatch target: names the implementation the factory builds.
    pub provider: String,
}

#[derive(Clone)]
pub struct CatalogEntry {
    pub definition: EvaluatorDefinition,
    pub handler: Arc<dyn Evaluator>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("evaluator {identifier}@{version} is not registered")]
    UnknownEvaluator { identifier: String, version: String },

    #[error("no implementation for provider '{0}'")]
    UnknownProvider(String),

    #[error("config for {identifier}@{version} rejected: {source}")]
    InvalidConfig {
        identifier: String,
        version: String,
        #[source]
        source: ConfigValidationError,
    },
}

/// Builds dispatch handles for seeded definitions by provider name.
pub trait EvaluatorFactory: Send + Sync {
    fn build(&self, provider: &str) -> Option<Arc<dyn Evaluator>>;
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CatalogKey {
    identifier: String,
    version: String,
    org_id: Option<OrgId>,
}

/// The registry itself. Reads take a shared lock and are the hot path
/// (resolution during execution); writes happen at seed time and on
/// user registration.
#[derive(Default)]
pub struct EvaluatorCatalog {
    entries: RwLock<HashMap<CatalogKey, CatalogEntry>>,
}

impl EvaluatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one evaluator under the given scope. `org_id = None` registers
    /// a builtin visible to every organization.
    pub fn register(
        &self,
        org_id: Option<OrgId>,
        definition: EvaluatorDefinition,
        handler: Arc<dyn Evaluator>,
    ) {
        let key = CatalogKey {
            identifier: definition.identifier.clone(),
            version: definition.version.clone(),
            org_id,
        };
        let mut entries = self.entries.write();
        let replaced = entries
            .insert(key, CatalogEntry { definition, handler })
            .is_some();
        if replaced {
            debug!("catalog registration replaced an existing entry");
        }
    }

    /// Seed the catalog from an ordered list of builtin definitions. A
    /// definition whose provider the factory does not know is an error: a
    /// seeded evaluator that can never dispatch would fail monitors at
    /// execution time instead of startup.
    pub fn load_builtins(
        &self,
        definitions: Vec<EvaluatorDefinition>,
        factory: &dyn EvaluatorFactory,
    ) -> Result<usize, CatalogError> {
        let mut loaded = 0;
        for definition in definitions {
            let handler = factory
                .build(&definition.provider)
                .ok_or_else(|| CatalogError::UnknownProvider(definition.provider.clone()))?;
            self.register(None, definition, handler);
            loaded += 1;
        }
        info!(count = loaded, "evaluator catalog seeded");
        Ok(loaded)
    }

    /// Resolve with shadowing precedence: the organization's own registration
    /// first, then the builtin.
    pub fn resolve(
        &self,
        org_id: Option<OrgId>,
        identifier: &str,
        version: &str,
    ) -> Option<CatalogEntry> {
        let entries = self.entries.read();
        if let Some(org_id) = org_id {
            let scoped = CatalogKey {
                identifier: identifier.to_string(),
                version: version.to_string(),
                org_id: Some(org_id),
            };
            if let Some(entry) = entries.get(&scoped) {
                return Some(entry.clone());
            }
        }
        let global = CatalogKey {
            identifier: identifier.to_string(),
            version: version.to_string(),
            org_id: None,
        };
        entries.get(&global).cloned()
    }

    /// Validate a monitor's evaluator selections against their declared
    /// schemas. Called at monitor-creation time; a failure here means the
    /// monitor is never persisted and no run is ever scheduled.
    pub fn validate_specs(
        &self,
        org_id: OrgId,
        specs: &[EvaluatorSpec],
    ) -> Result<(), CatalogError> {
        for spec in specs {
            let entry = self
                .resolve(Some(org_id), &spec.identifier, &spec.version)
                .ok_or_else(|| CatalogError::UnknownEvaluator {
                    identifier: spec.identifier.clone(),
                    version: spec.version.clone(),
                })?;
            validate_config(&entry.definition.config_schema, &spec.config).map_err(|source| {
                CatalogError::InvalidConfig {
                    identifier: spec.identifier.clone(),
                    version: spec.version.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Snapshot of all definitions, builtins and scoped alike.
    pub fn definitions(&self) -> Vec<EvaluatorDefinition> {
        self.entries
            .read()
            .values()
            .map(|e| e.definition.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evaluator::{
        ConfigValue, EvalItem, EvalScore, EvaluatorConfig, EvaluatorError, ParamType,
    };
    use async_trait::async_trait;
    use uuid::Uuid;

    struct FixedScore(f64);

    #[async_trait]
    impl Evaluator for FixedScore {
        async fn evaluate(
            &self,
            _item: &EvalItem<'_>,
            _config: &EvaluatorConfig,
        ) -> Result<EvalScore, EvaluatorError> {
            Ok(EvalScore {
                score: self.0,
                explanation: None,
                metadata: serde_json::Value::Null,
            })
        }
    }

    fn definition(identifier: &str, display: &str) -> EvaluatorDefinition {
        EvaluatorDefinition {
            identifier: identifier.into(),
            version: "1.0".into(),
            display_name: display.into(),
            description: String::new(),
            tags: vec![],
            level: EvaluatorLevel::Trace,
            config_schema: vec![ParamDef {
                name: "threshold".into(),
                param_type: ParamType::Number,
                required: true,
            }],
            provider: "fixed".into(),
        }
    }

    #[test]
    fn org_registration_shadows_builtin() {
        let catalog = EvaluatorCatalog::new();
        let org = OrgId(Uuid::new_v4());
        catalog.register(None, definition("faithfulness", "builtin"), Arc::new(FixedScore(0.1)));
        catalog.register(
            Some(org),
            definition("faithfulness", "scoped"),
            Arc::new(FixedScore(0.9)),
        );

        let scoped = catalog.resolve(Some(org), "faithfulness", "1.0").unwrap();
        assert_eq!(scoped.definition.display_name, "scoped");

        // Other organizations still see the builtin.
        let other = catalog
            .resolve(Some(OrgId(Uuid::new_v4())), "faithfulness", "1.0")
            .unwrap();
        assert_eq!(other.definition.display_name, "builtin");
    }

    #[test]
    fn reregistration_upserts_without_duplicating() {
        let catalog = EvaluatorCatalog::new();
        catalog.register(None, definition("toxicity", "first"), Arc::new(FixedScore(0.5)));
        catalog.register(None, definition("toxicity", "second"), Arc::new(FixedScore(0.5)));
        assert_eq!(catalog.definitions().len(), 1);
        let entry = catalog.resolve(None, "toxicity", "1.0").unwrap();
        assert_eq!(entry.definition.display_name, "second");
    }

    #[test]
    fn validate_specs_rejects_unknown_and_malformed() {
        let catalog = EvaluatorCatalog::new();
        let org = OrgId(Uuid::new_v4());
        catalog.register(None, definition("faithfulness", "builtin"), Arc::new(FixedScore(0.5)));

        let unknown = EvaluatorSpec {
            identifier: "nonexistent".into(),
            version: "1.0".into(),
            config: EvaluatorConfig::new(),
        };
        assert!(matches!(
            catalog.validate_specs(org, &[unknown]),
            Err(CatalogError::UnknownEvaluator { .. })
        ));

        let malformed = EvaluatorSpec {
            identifier: "faithfulness".into(),
            version: "1.0".into(),
            config: EvaluatorConfig::new(), // missing required threshold
        };
        assert!(matches!(
            catalog.validate_specs(org, &[malformed]),
            Err(CatalogError::InvalidConfig { .. })
        ));

        let mut config = EvaluatorConfig::new();
        config.insert("threshold".into(), ConfigValue::Number(0.7));
        let valid = EvaluatorSpec {
            identifier: "faithfulness".into(),
            version: "1.0".into(),
            config,
        };
        catalog.validate_specs(org, &[valid]).unwrap();
    }
}
