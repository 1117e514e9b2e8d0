// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health HTTP server built on axum.
//!
//! Serves `GET /health`, `GET /ready`, and `GET /metrics` with JSON bodies.
//! The checks themselves are injected as a closure so the orchestrator owns
//! what "healthy" means and tests can force any state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arkiv_core::ArkivError;
use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::handlers::{self, HealthCheck};
use crate::metrics::ArchiveMetrics;

/// Shared state for the health request handlers.
#[derive(Clone)]
pub struct HealthState {
    /// Produces the current set of liveness checks on every request.
    pub checks: Arc<dyn Fn() -> Vec<HealthCheck> + Send + Sync>,
    /// Live counters rendered by `/metrics`.
    pub metrics: Arc<ArchiveMetrics>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Running health listener; dropping it does not stop the task, call
/// [`HealthServer::stop`].
pub struct HealthServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl HealthServer {
    /// Bind `host:port` and start serving. Port 0 binds an ephemeral port;
    /// the actual address is available via [`HealthServer::addr`].
    pub async fn start(host: &str, port: u16, state: HealthState) -> Result<Self, ArkivError> {
        let app = Router::new()
            .route("/health", get(handlers::get_health))
            .route("/ready", get(handlers::get_ready))
            .route("/metrics", get(handlers::get_metrics))
            .with_state(state)
            .layer(CorsLayer::permissive());

        let bind = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| ArkivError::Health(format!("failed to bind {bind}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ArkivError::Health(format!("no local addr: {e}")))?;

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "health server terminated abnormally");
            }
        });

        info!(%addr, "health server listening");
        Ok(Self {
            addr,
            cancel,
            handle,
        })
    }

    /// Address the listener actually bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Gracefully stop the listener and wait for the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
        info!("health server stopped");
    }
}
