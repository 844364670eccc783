// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

pub mod postgres_monitor;
pub mod postgres_run;
pub mod postgres_score;
pub mod memory;

pub use memory::InMemoryStore;
pub use postgres_monitor::PostgresMonitorRepository;
pub use postgres_run::PostgresRunRepository;
pub use postgres_score::PostgresScoreRepository;
