// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `arkiv serve` command implementation.
//!
//! Brings the archiver up (WAL recovery included), then parks on the
//! shutdown token. SIGINT/SIGTERM trigger the orderly close sequence
//! before the process exits.

use arkiv_config::ArkivConfig;
use arkiv_core::ArkivError;
use arkiv_engine::{Archiver, shutdown};
use tracing::info;

/// Run the archival engine until a termination signal arrives.
pub async fn run_serve(config: ArkivConfig) -> Result<(), ArkivError> {
    info!("starting arkiv serve");

    let archiver = Archiver::init(config).await?;
    info!(health = %archiver.health_addr(), "archiver running");

    let cancel = shutdown::shutdown_token();
    cancel.cancelled().await;

    archiver.close().await;
    info!("arkiv serve shutdown complete");
    Ok(())
}
