// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Builtin evaluator definitions loaded from a YAML seed file at startup.

use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::application::catalog::EvaluatorDefinition;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Load evaluator definitions from a YAML seed file. A missing file is not
/// an error: a deployment may rely entirely on runtime registration.
pub fn load_seed_file(path: &Path) -> Result<Vec<EvaluatorDefinition>, SeedError> {
    if !path.exists() {
        warn!(path = %path.display(), "Catalog seed file not found, starting empty");
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let definitions: Vec<EvaluatorDefinition> =
        serde_yaml::from_str(&contents).map_err(|source| SeedError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run::EvaluatorLevel;

    #[test]
    fn parses_definitions_from_yaml() {
        let dir = std::env::temp_dir().join(format!("argus-seed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.yaml");
        std::fs::write(
            &path,
            r#"
- identifier: latency-budget
  version: "1.0"
  display_name: Latency Budget
  level: trace
  provider: latency_budget
  config_schema:
    - name: budget_ms
      type: number
      required: true
- identifier: keyword-scan
  version: "1.0"
  display_name: Keyword Scan
  level: span
  provider: keyword_scan
"#,
        )
        .unwrap();

        let definitions = load_seed_file(&path).unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].identifier, "latency-budget");
        assert_eq!(definitions[0].level, EvaluatorLevel::Trace);
        assert_eq!(definitions[1].provider, "keyword_scan");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let definitions =
            load_seed_file(Path::new("/nonexistent/argus-catalog.yaml")).unwrap();
        assert!(definitions.is_empty());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = std::env::temp_dir().join(format!("argus-seed-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.yaml");
        std::fs::write(&path, "definitely: [not, a, list, of, definitions").unwrap();

        assert!(matches!(
            load_seed_file(&path),
            Err(SeedError::Parse { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
