// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! # Argus Monitor CLI
//!
//! The `argus` binary runs the monitor scheduling daemon and provides
//! operator commands against the same database.
//!
//! ## Commands
//!
//! - `argus serve` - Run the scheduler daemon (polling loop + executor)
//! - `argus tick` - One scheduling pass, waiting for dispatched runs
//! - `argus migrate` - Create the monitor tables
//! - `argus monitor create|show|delete|runs` - Monitor management
//! - `argus catalog list` - Show registered evaluators
//! - `argus config show|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod builtins;
mod commands;
mod config;
mod runtime;

use commands::{CatalogCommand, ConfigCommand, MonitorCommand};

/// Argus Monitor - scheduled evaluation of agent traces
#[derive(Parser)]
#[command(name = "argus")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ARGUS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ARGUS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon
    #[command(name = "serve")]
    Serve,

    /// Execute one scheduling pass and wait for dispatched runs
    #[command(name = "tick")]
    Tick,

    /// Create or update the database schema
    #[command(name = "migrate")]
    Migrate,

    /// Monitor management
    #[command(name = "monitor")]
    Monitor {
        #[command(subcommand)]
        command: MonitorCommand,
    },

    /// Evaluator catalog inspection
    #[command(name = "catalog")]
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve) => commands::serve::execute(cli.config).await,
        Some(Commands::Tick) => commands::tick::execute(cli.config).await,
        Some(Commands::Migrate) => commands::migrate::execute(cli.config).await,
        Some(Commands::Monitor { command }) => {
            commands::monitor::handle_command(command, cli.config).await
        }
        Some(Commands::Catalog { command }) => {
            commands::catalog::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config_cmd::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
