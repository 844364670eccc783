// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Monitor management commands
//!
//! Commands: create, show, delete, runs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use colored::Colorize;
use serde::Deserialize;
use std::path::PathBuf;
use uuid::Uuid;

use argus_core::application::monitor_service::CreateMonitorRequest;
use argus_core::domain::monitor::{
    AgentId, EnvironmentId, EvaluatorSpec, MonitorId, MonitorKind, OrgId, ProjectId,
};

use crate::config::ArgusConfig;
use crate::runtime::Runtime;

#[derive(Subcommand)]
pub enum MonitorCommand {
    /// Create a monitor from a YAML definition
    Create {
        /// Path to the monitor definition
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show one monitor
    Show {
        /// Monitor id
        #[arg(value_name = "ID")]
        id: Uuid,
    },

    /// Delete a monitor and its runs
    Delete {
        /// Monitor id
        #[arg(value_name = "ID")]
        id: Uuid,
    },

    /// List a monitor's runs with per-evaluator aggregates
    Runs {
        /// Monitor id
        #[arg(value_name = "ID")]
        id: Uuid,
    },
}

/// On-disk shape of a monitor definition.
#[derive(Deserialize)]
struct MonitorFile {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    kind: MonitorKind,
    org_id: Uuid,
    project_id: Uuid,
    agent_id: Uuid,
    environment_id: Uuid,
    evaluators: Vec<EvaluatorSpec>,
    interval_minutes: Option<i64>,
    trace_start: Option<DateTime<Utc>>,
    trace_end: Option<DateTime<Utc>>,
    sampling_rate: f64,
}

pub async fn handle_command(
    command: MonitorCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = ArgusConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let runtime = Runtime::build(&config).await?;

    match command {
        MonitorCommand::Create { file } => create(&runtime, file).await,
        MonitorCommand::Show { id } => show(&runtime, MonitorId(id)).await,
        MonitorCommand::Delete { id } => delete(&runtime, MonitorId(id)).await,
        MonitorCommand::Runs { id } => runs(&runtime, MonitorId(id)).await,
    }
}

async fn create(runtime: &Runtime, file: PathBuf) -> Result<()> {
    let contents = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let definition: MonitorFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let request = CreateMonitorRequest {
        display_name: definition
            .display_name
            .unwrap_or_else(|| definition.name.clone()),
        name: definition.name,
        kind: definition.kind,
        org_id: OrgId(definition.org_id),
        project_id: ProjectId(definition.project_id),
        agent_id: AgentId(definition.agent_id),
        environment_id: EnvironmentId(definition.environment_id),
        evaluators: definition.evaluators,
        interval_minutes: definition.interval_minutes,
        trace_start: definition.trace_start,
        trace_end: definition.trace_end,
        sampling_rate: definition.sampling_rate,
    };

    let monitor = runtime.service.create_monitor(request).await?;
    println!(
        "{} monitor {} ({})",
        "Created".green(),
        monitor.name.bold(),
        monitor.id.0
    );
    if monitor.kind == MonitorKind::Past {
        println!("Backfill run dispatched");
        // A backfill executes immediately; hold the process open for it.
        runtime.scheduler.drain().await;
    }
    Ok(())
}

async fn show(runtime: &Runtime, id: MonitorId) -> Result<()> {
    let monitor = runtime.service.get_monitor(id).await?;

    println!("{}", monitor.display_name.bold());
    println!("  Name: {}", monitor.name);
    println!("  Kind: {}", monitor.kind.as_str());
    println!("  Sampling rate: {}", monitor.sampling_rate);
    if let Some(schedule) = &monitor.schedule {
        println!("  Interval: {} min", schedule.interval_minutes);
        println!("  Next run: {}", schedule.next_run_time);
    }
    if let Some(range) = &monitor.range {
        println!("  Range: {} .. {}", range.trace_start, range.trace_end);
    }
    println!("  Evaluators:");
    for spec in &monitor.evaluators {
        println!("    - {}", spec.display_name());
    }
    Ok(())
}

async fn delete(runtime: &Runtime, id: MonitorId) -> Result<()> {
    runtime.service.delete_monitor(id).await?;
    println!("{} monitor {}", "Deleted".green(), id.0);
    Ok(())
}

async fn runs(runtime: &Runtime, id: MonitorId) -> Result<()> {
    let history = runtime.service.run_history(id).await?;
    if history.is_empty() {
        println!("No runs yet");
        return Ok(());
    }

    for summary in history {
        let run = &summary.run;
        let status = match run.status.as_str() {
            "success" => run.status.as_str().green(),
            "failed" => run.status.as_str().red(),
            other => other.yellow(),
        };
        println!(
            "{} [{}] {} .. {}",
            run.name.bold(),
            status,
            run.trace_start,
            run.trace_end
        );
        if let Some(message) = &run.error_message {
            println!("  error: {}", message);
        }
        for evaluator in &summary.evaluators {
            println!(
                "  {}: {} scored, {} errored, mean {:.3}",
                evaluator.display_name,
                evaluator.count - evaluator.error_count,
                evaluator.error_count,
                evaluator.aggregations.mean
            );
        }
    }
    Ok(())
}
