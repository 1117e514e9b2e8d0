// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health, readiness, and metrics surface for the Arkiv archival engine.
//!
//! A minimal axum listener for orchestration probes plus the counter types
//! the engine records into. Checks are injected by the orchestrator so this
//! crate knows nothing about stores or WALs.

pub mod handlers;
pub mod metrics;
pub mod probes;
pub mod server;

pub use handlers::HealthCheck;
pub use metrics::{ArchiveMetrics, MetricsSnapshot};
pub use server::{HealthServer, HealthState};
