// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the health surface.
//!
//! Handles GET /health, GET /ready, GET /metrics. Anything else falls
//! through to axum's default 404.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::metrics::MetricsSnapshot;
use crate::server::HealthState;

/// Result of one liveness check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Check name ("store", "wal", "buffer", "disk", "memory").
    pub name: String,
    /// Whether the check passed.
    pub healthy: bool,
    /// Optional human-readable detail (current value, threshold).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthCheck {
    pub fn pass(name: &str, detail: impl Into<Option<String>>) -> Self {
        Self {
            name: name.to_string(),
            healthy: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            healthy: false,
            detail: Some(detail.into()),
        }
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when every check passes, "degraded" otherwise.
    pub status: String,
    /// Seconds since the archiver started.
    pub uptime_secs: u64,
    /// Individual check results.
    pub checks: Vec<HealthCheck>,
}

/// Response body for GET /ready.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
}

/// GET /health
///
/// Runs the injected checks and aggregates: 200 when all pass, 503 when any
/// fails. The body always lists every check so probes can tell which one
/// degraded.
pub async fn get_health(State(state): State<HealthState>) -> Response {
    let checks = (state.checks)();
    let all_healthy = checks.iter().all(|c| c.healthy);

    let body = HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        checks,
    };

    let code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// GET /ready
///
/// Unconditional 200: the listener being up is the readiness signal.
pub async fn get_ready() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<HealthState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_constructors() {
        let pass = HealthCheck::pass("disk", Some("42.0% used".to_string()));
        assert!(pass.healthy);
        assert_eq!(pass.name, "disk");

        let fail = HealthCheck::fail("memory", "91.3% used, threshold 85%");
        assert!(!fail.healthy);
        assert!(fail.detail.unwrap().contains("91.3"));
    }

    #[test]
    fn health_response_serializes() {
        let body = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 42,
            checks: vec![HealthCheck::pass("wal", None)],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("\"name\":\"wal\""));
        // No detail key when absent.
        assert!(!json.contains("\"detail\""));
    }

    #[test]
    fn ready_response_serializes() {
        let json = serde_json::to_string(&ReadyResponse {
            status: "ready".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"ready"}"#);
    }
}
