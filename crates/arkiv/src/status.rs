// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `arkiv status` command implementation.
//!
//! Reads the health endpoint to display archiver state, uptime, and the
//! individual checks. Falls back gracefully when the archiver is not
//! running.

use std::io::IsTerminal;
use std::time::Duration;

use arkiv_config::ArkivConfig;
use arkiv_core::ArkivError;
use serde::{Deserialize, Serialize};

/// Health endpoint response body.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    checks: Vec<CheckEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct CheckEntry {
    name: String,
    healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
struct StatusResponse {
    running: bool,
    status: String,
    uptime_secs: Option<u64>,
    uptime_human: Option<String>,
    checks: Vec<CheckEntry>,
    health_host: String,
    health_port: u16,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Run the `arkiv status` command.
///
/// With `--json`, outputs structured JSON for scripting. With `--plain` or
/// a non-TTY stdout, colors are disabled.
pub async fn run_status(config: &ArkivConfig, json: bool, plain: bool) -> Result<(), ArkivError> {
    let host = &config.health.host;
    let port = config.health.port;
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| ArkivError::Internal(format!("failed to create HTTP client: {e}")))?;

    let use_color = !plain && std::io::stdout().is_terminal();

    match client.get(&url).send().await {
        Ok(resp) => {
            // Both 200 and 503 carry a health body; 503 means degraded.
            let health: HealthResponse = resp
                .json()
                .await
                .map_err(|e| ArkivError::Internal(format!("failed to parse health response: {e}")))?;
            let uptime_human = format_uptime(health.uptime_secs);

            if json {
                print_json(&StatusResponse {
                    running: true,
                    status: health.status.clone(),
                    uptime_secs: Some(health.uptime_secs),
                    uptime_human: Some(uptime_human),
                    checks: health.checks,
                    health_host: host.clone(),
                    health_port: port,
                });
            } else {
                print_running(&health, &uptime_human, use_color);
            }
        }
        Err(_) => {
            if json {
                print_json(&StatusResponse {
                    running: false,
                    status: "not running".to_string(),
                    uptime_secs: None,
                    uptime_human: None,
                    checks: Vec::new(),
                    health_host: host.clone(),
                    health_port: port,
                });
            } else {
                print_offline(host, port, use_color);
            }
        }
    }

    Ok(())
}

fn print_json(status: &StatusResponse) {
    println!(
        "{}",
        serde_json::to_string_pretty(status).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Print running status with per-check lines.
fn print_running(health: &HealthResponse, uptime: &str, use_color: bool) {
    println!();
    println!("  arkiv status");
    println!("  {}", "-".repeat(40));

    if use_color {
        use colored::Colorize;
        let state = if health.status == "ok" {
            format!("{} {}", "✓".green(), health.status.green())
        } else {
            format!("{} {}", "!".yellow(), health.status.yellow())
        };
        println!("    State:    {state} (uptime: {uptime})");
    } else {
        let tag = if health.status == "ok" { "[OK]" } else { "[WARN]" };
        println!("    State:    {tag} {} (uptime: {uptime})", health.status);
    }

    println!();
    for check in &health.checks {
        let detail = check.detail.as_deref().unwrap_or("");
        if use_color {
            use colored::Colorize;
            let mark = if check.healthy {
                "✓".green().to_string()
            } else {
                "✗".red().to_string()
            };
            println!("    {mark} {:<8} {detail}", check.name);
        } else {
            let mark = if check.healthy { "[OK]  " } else { "[FAIL]" };
            println!("    {mark} {:<8} {detail}", check.name);
        }
    }
    println!();
}

/// Print offline status with a hint on how to start.
fn print_offline(host: &str, port: u16, use_color: bool) {
    println!();
    println!("  arkiv status");
    println!("  {}", "-".repeat(40));

    if use_color {
        use colored::Colorize;
        println!("    State:    {} {}", "✗".red(), "not running".red());
    } else {
        println!("    State:    [FAIL] not running");
    }

    println!("    Endpoint: http://{host}:{port}/health");
    println!();
    println!("  Start with: arkiv serve");
    println!();
}
