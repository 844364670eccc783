// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Evaluator catalog inspection

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::ArgusConfig;
use crate::runtime::Runtime;

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// List registered evaluators
    List,
}

pub async fn handle_command(
    command: CatalogCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = ArgusConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let runtime = Runtime::build(&config).await?;

    match command {
        CatalogCommand::List => list(&runtime),
    }
}

fn list(runtime: &Runtime) -> Result<()> {
    let mut definitions = runtime.catalog.definitions();
    definitions.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    for definition in definitions {
        println!(
            "{}@{} [{}]",
            definition.identifier.bold(),
            definition.version,
            definition.level.as_str()
        );
        if !definition.description.is_empty() {
            println!("  {}", definition.description);
        }
        for param in &definition.config_schema {
            let required = if param.required { " (required)" } else { "" };
            println!("  param: {}{}", param.name, required);
        }
    }
    Ok(())
}
