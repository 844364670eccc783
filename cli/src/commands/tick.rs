// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! One scheduling pass. Useful under an external scheduler (cron, systemd
//! timers) instead of the long-running daemon.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::ArgusConfig;
use crate::runtime::Runtime;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let config = ArgusConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let runtime = Runtime::build(&config).await?;

    let dispatched = runtime.scheduler.tick().await?;
    println!("Dispatched {} run(s)", dispatched.to_string().bold());

    runtime.scheduler.drain().await;
    Ok(())
}
