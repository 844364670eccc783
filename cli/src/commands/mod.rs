// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Argus CLI

pub mod catalog;
pub mod config_cmd;
pub mod migrate;
pub mod monitor;
pub mod serve;
pub mod tick;

pub use self::catalog::CatalogCommand;
pub use self::config_cmd::ConfigCommand;
pub use self::monitor::MonitorCommand;
