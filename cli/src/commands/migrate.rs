// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Schema creation. `serve` migrates on startup too; this exists for
//! deployments that run migrations under separate credentials.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use argus_core::infrastructure::schema::Schema;
use argus_core::infrastructure::Database;

use crate::config::ArgusConfig;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let config = ArgusConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let Some(url) = &config.database_url else {
        bail!("migrate requires database_url (or DATABASE_URL) to be set");
    };

    let database = Database::new(url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    Schema::migrate(database.get_pool())
        .await
        .context("Failed to migrate schema")?;

    println!("{}", "Schema is up to date".green());
    Ok(())
}
