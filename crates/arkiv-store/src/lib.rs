// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite analytical store for the Arkiv archival engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed message
//! queries (upsert, time range, content search, stats, retention deletes),
//! and online snapshot copies through the Backup API.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod snapshot;

pub use database::Database;
