// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Argus Monitor Core
//!
//! Monitor scheduling and trace-evaluation execution for the Argus agent
//! platform.
//!
//! # Architecture
//!
//! - **Domain:** monitors, runs, scores, the evaluator contract, repository
//!   interfaces
//! - **Application:** scheduler, run executor, evaluator catalog
//! - **Infrastructure:** PostgreSQL repositories, schema, trace-source client

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
