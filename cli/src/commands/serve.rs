// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! The daemon: scheduler loop, executor, and Prometheus endpoint.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ArgusConfig;
use crate::runtime::Runtime;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let config = ArgusConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to start metrics endpoint")?;
        info!(port, "Prometheus endpoint listening");
    }

    let runtime = Runtime::build(&config).await?;

    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let scheduler = Arc::clone(&runtime.scheduler);
    let scheduler_task = tokio::spawn(scheduler.run_loop(loop_cancel));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    cancel.cancel();
    scheduler_task.await.context("Scheduler task panicked")?;

    // Let in-flight runs finish before the process exits.
    runtime.scheduler.drain().await;
    info!("Shutdown complete");
    Ok(())
}
