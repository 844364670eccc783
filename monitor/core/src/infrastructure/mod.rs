// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod schema;
pub mod repositories;
pub mod trace_query;
pub mod catalog_seed;

pub use db::Database;
pub use trace_query::HttpTraceSource;
