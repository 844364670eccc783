// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::ArgusConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Generate a sample configuration file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./argus-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show => show(config_override),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>) -> Result<()> {
    let config = ArgusConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;

    println!("{}", "Effective configuration:".bold());
    println!(
        "  database_url: {}",
        config
            .database_url
            .as_deref()
            .unwrap_or("(unset, in-memory mode)")
    );
    println!("  trace_source_url: {}", config.trace_source_url);
    match &config.catalog_seed_path {
        Some(path) => println!("  catalog_seed_path: {}", path.display()),
        None => println!("  catalog_seed_path: (unset)"),
    }
    println!("  poll_interval_secs: {}", config.poll_interval_secs);
    println!("  run_timeout_minutes: {}", config.run_timeout_minutes);
    println!("  max_concurrent_runs: {}", config.max_concurrent_runs);
    println!("  eval_concurrency: {}", config.eval_concurrency);
    println!("  aggregation_batch: {}", config.aggregation_batch);
    match config.metrics_port {
        Some(port) => println!("  metrics_port: {}", port),
        None => println!("  metrics_port: (disabled)"),
    }
    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists, refusing to overwrite", output.display());
    }
    std::fs::write(&output, ArgusConfig::sample_yaml())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{} {}", "Wrote".green(), output.display());
    Ok(())
}
