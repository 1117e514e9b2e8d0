// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retention cleanup: deletes aged rows, optionally exporting them to
//! cold-archive files first.
//!
//! Runs on an independent daily timer and is also manually invocable.
//! Exported rows are appended as JSON lines to one file per calendar month
//! (`archive_<YYYY-MM>`), so repeated passes over overlapping ranges keep
//! growing the same month files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arkiv_config::model::CleanupConfig;
use arkiv_core::{ArchiveMessage, ArkivError, RetentionOutcome};
use arkiv_store::{Database, queries};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DAILY: Duration = Duration::from_secs(24 * 3600);

/// Enforces the retention policy over the analytical store.
pub struct CleanupManager {
    db: Arc<Database>,
    retention_days: u32,
    max_size_mb: u64,
    archive_enabled: bool,
    archive_dir: PathBuf,
    enabled: bool,
    cancel: CancellationToken,
    task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CleanupManager {
    pub fn new(config: &CleanupConfig, db: Arc<Database>) -> Self {
        let archive_dir = config.archive_dir(&db.path().to_string_lossy());
        Self {
            db,
            retention_days: config.retention_days,
            max_size_mb: config.max_size_mb,
            archive_enabled: config.archive_enabled,
            archive_dir,
            enabled: config.enabled,
            cancel: CancellationToken::new(),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Start the daily cleanup schedule. Failures are logged; the schedule
    /// continues unaffected.
    pub fn start(self: &Arc<Self>) {
        if !self.enabled {
            info!("cleanup disabled by configuration");
            return;
        }
        let manager = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(DAILY);
            // Skip the immediate tick: cleanup at startup would race recovery.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match manager.perform_cleanup().await {
                            Ok(outcome) => debug!(
                                deleted = outcome.deleted,
                                archived = outcome.archived,
                                "scheduled cleanup complete"
                            ),
                            Err(e) => warn!(error = %e, "scheduled cleanup failed"),
                        }
                        if let Err(e) = manager.check_db_size() {
                            warn!(error = %e, "store size check failed");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("cleanup schedule stopped");
                        break;
                    }
                }
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(
            retention_days = self.retention_days,
            archive = self.archive_enabled,
            "cleanup schedule started"
        );
    }

    /// Delete (and optionally cold-archive) rows older than the retention
    /// cutoff. Returns how many rows were deleted and archived.
    pub async fn perform_cleanup(&self) -> Result<RetentionOutcome, ArkivError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.retention_days));

        let mut archived: u64 = 0;
        if self.archive_enabled {
            let rows = queries::messages::select_older_than(&self.db, cutoff).await?;
            if !rows.is_empty() {
                archived = self.export_to_archive(&rows).await?;
            }
        }

        let deleted = queries::messages::delete_older_than(&self.db, cutoff).await?;
        info!(deleted, archived, retention_days = self.retention_days, "cleanup pass complete");
        Ok(RetentionOutcome { deleted, archived })
    }

    /// Append rows to per-month archive files in chronological order.
    async fn export_to_archive(&self, rows: &[ArchiveMessage]) -> Result<u64, ArkivError> {
        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(ArkivError::storage)?;

        let mut by_month: BTreeMap<String, Vec<&ArchiveMessage>> = BTreeMap::new();
        for msg in rows {
            by_month
                .entry(msg.timestamp.format("%Y-%m").to_string())
                .or_default()
                .push(msg);
        }

        let mut exported: u64 = 0;
        for (month, messages) in by_month {
            let path = self.archive_dir.join(format!("archive_{month}"));
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(ArkivError::storage)?;
            for msg in messages {
                let mut line = serde_json::to_string(msg)
                    .map_err(|e| ArkivError::Internal(format!("cannot serialize row: {e}")))?;
                line.push('\n');
                file.write_all(line.as_bytes())
                    .await
                    .map_err(ArkivError::storage)?;
                exported += 1;
            }
            file.sync_data().await.map_err(ArkivError::storage)?;
            debug!(month = %month, path = %path.display(), "archived month segment");
        }
        Ok(exported)
    }

    /// Report whether the store file exceeds the configured size ceiling.
    /// Alert-only: logs a warning, never deletes anything.
    pub fn check_db_size(&self) -> Result<bool, ArkivError> {
        let size = self.db.file_size()?;
        let limit = self.max_size_mb * 1024 * 1024;
        let over = size > limit;
        if over {
            warn!(
                size_bytes = size,
                limit_mb = self.max_size_mb,
                "store size exceeds configured ceiling"
            );
        }
        Ok(over)
    }

    /// Cancel the schedule and wait for the task to stop.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
