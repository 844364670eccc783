// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

pub mod catalog;
pub mod sampling;
pub mod scheduler;
pub mod executor;
pub mod monitor_service;

// Re-export services for convenience
pub use catalog::{EvaluatorCatalog, EvaluatorDefinition, EvaluatorFactory, CatalogError};
pub use executor::{RunExecutor, ExecutorConfig};
pub use monitor_service::{MonitorService, StandardMonitorService, CreateMonitorRequest, RunSummary};
pub use sampling::DeterministicSampler;
pub use scheduler::{MonitorScheduler, SchedulerConfig};
