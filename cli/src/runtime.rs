// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Wires the configured storage, trace source, catalog, executor, and
//! scheduler into one object the commands share.

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use argus_core::application::catalog::EvaluatorCatalog;
use argus_core::application::executor::{ExecutorConfig, RunExecutor};
use argus_core::application::monitor_service::{MonitorService, StandardMonitorService};
use argus_core::application::scheduler::{MonitorScheduler, SchedulerConfig};
use argus_core::domain::repository::{MonitorRepository, MonitorRunRepository, ScoreRepository};
use argus_core::infrastructure::catalog_seed;
use argus_core::infrastructure::repositories::{
    InMemoryStore, PostgresMonitorRepository, PostgresRunRepository, PostgresScoreRepository,
};
use argus_core::infrastructure::schema::Schema;
use argus_core::infrastructure::{Database, HttpTraceSource};

use crate::builtins::{builtin_definitions, BuiltinEvaluatorFactory};
use crate::config::ArgusConfig;

pub struct Runtime {
    pub catalog: Arc<EvaluatorCatalog>,
    pub scheduler: Arc<MonitorScheduler>,
    pub service: Arc<dyn MonitorService>,
}

impl Runtime {
    pub async fn build(config: &ArgusConfig) -> Result<Self> {
        let (monitors, runs, scores) = Self::build_repositories(config).await?;

        let catalog = Arc::new(EvaluatorCatalog::new());
        let factory = BuiltinEvaluatorFactory;
        catalog
            .load_builtins(builtin_definitions(), &factory)
            .context("Failed to register compiled-in evaluators")?;
        if let Some(seed_path) = &config.catalog_seed_path {
            let definitions = catalog_seed::load_seed_file(seed_path)
                .context("Failed to load catalog seed file")?;
            catalog
                .load_builtins(definitions, &factory)
                .context("Failed to register seeded evaluators")?;
        }

        let traces = HttpTraceSource::new(&config.trace_source_url)
            .context("Failed to build trace store client")?;

        let executor = Arc::new(RunExecutor::new(
            Arc::clone(&monitors),
            Arc::clone(&runs),
            Arc::clone(&scores),
            Arc::new(traces),
            Arc::clone(&catalog),
            ExecutorConfig {
                eval_concurrency: config.eval_concurrency,
                aggregation_batch: config.aggregation_batch,
                eval_timeout: Duration::from_secs(config.eval_timeout_secs),
            },
        ));

        let scheduler = Arc::new(MonitorScheduler::new(
            Arc::clone(&monitors),
            Arc::clone(&runs),
            executor,
            SchedulerConfig {
                poll_interval: Duration::from_secs(config.poll_interval_secs),
                run_timeout: ChronoDuration::minutes(config.run_timeout_minutes),
                max_concurrent_runs: config.max_concurrent_runs,
            },
        ));

        let service: Arc<dyn MonitorService> = Arc::new(StandardMonitorService::new(
            monitors,
            runs,
            scores,
            Arc::clone(&catalog),
            Arc::clone(&scheduler),
        ));

        Ok(Self {
            catalog,
            scheduler,
            service,
        })
    }

    async fn build_repositories(
        config: &ArgusConfig,
    ) -> Result<(
        Arc<dyn MonitorRepository>,
        Arc<dyn MonitorRunRepository>,
        Arc<dyn ScoreRepository>,
    )> {
        match &config.database_url {
            Some(url) => {
                let database = Database::new(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                Schema::migrate(database.get_pool())
                    .await
                    .context("Failed to migrate schema")?;
                info!("Connected to PostgreSQL");
                let pool = database.get_pool().clone();
                Ok((
                    Arc::new(PostgresMonitorRepository::new(pool.clone())),
                    Arc::new(PostgresRunRepository::new(pool.clone())),
                    Arc::new(PostgresScoreRepository::new(pool)),
                ))
            }
            None => {
                warn!("No database_url configured; monitors will not survive restart");
                let store = InMemoryStore::new();
                Ok((
                    Arc::new(store.clone()),
                    Arc::new(store.clone()),
                    Arc::new(store),
                ))
            }
        }
    }
}
