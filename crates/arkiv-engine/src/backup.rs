// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled point-in-time snapshots of the analytical store.
//!
//! Backups protect against storage corruption or loss, independently of the
//! WAL and buffer (which only protect against process crash). Artifacts are
//! full online copies named `backup_<timestamp>`; retention keeps the most
//! recent N. Restore first copies the live store aside so a bad restore is
//! itself reversible.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arkiv_config::model::BackupConfig;
use arkiv_core::{ArkivError, BackupInfo};
use arkiv_health::ArchiveMetrics;
use arkiv_store::snapshot;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suffix of the safety copy written before a restore overwrites the live store.
const PRE_RESTORE_SUFFIX: &str = ".pre-restore";

/// Owns the backup directory and the periodic snapshot schedule.
pub struct BackupManager {
    db_path: PathBuf,
    dir: PathBuf,
    interval: Duration,
    retain_count: usize,
    enabled: bool,
    metrics: Arc<ArchiveMetrics>,
    cancel: CancellationToken,
    task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl BackupManager {
    pub fn new(config: &BackupConfig, db_path: &Path, metrics: Arc<ArchiveMetrics>) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            dir: config.dir(&db_path.to_string_lossy()),
            interval: Duration::from_secs(config.interval_hours * 3600),
            retain_count: config.retain_count,
            enabled: config.enabled,
            metrics,
            cancel: CancellationToken::new(),
            task: std::sync::Mutex::new(None),
        }
    }

    /// Backup directory in use.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// If enabled, take an immediate snapshot and then one per interval.
    /// Failures are logged; the schedule continues unaffected.
    pub fn start(self: &Arc<Self>) {
        if !self.enabled {
            info!("backups disabled by configuration");
            return;
        }
        let manager = Arc::clone(self);
        let cancel = self.cancel.clone();
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    // The first tick fires immediately: one snapshot at startup.
                    _ = interval.tick() => {
                        match manager.perform_backup().await {
                            Ok(path) => debug!(path = %path.display(), "scheduled backup complete"),
                            Err(e) => warn!(error = %e, "scheduled backup failed"),
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("backup schedule stopped");
                        break;
                    }
                }
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(
            dir = %self.dir.display(),
            interval_hours = self.interval.as_secs() / 3600,
            retain = self.retain_count,
            "backup schedule started"
        );
    }

    /// Snapshot the live store into a timestamped artifact, then prune
    /// artifacts beyond the retain count, oldest first.
    pub async fn perform_backup(&self) -> Result<PathBuf, ArkivError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ArkivError::Backup {
                message: format!("cannot create backup directory {}", self.dir.display()),
                source: Some(Box::new(e)),
            })?;

        let name = format!("backup_{}", Utc::now().format("%Y%m%dT%H%M%S%3f"));
        let target = self.dir.join(&name);

        let src = self.db_path.clone();
        let dst = target.clone();
        let size = tokio::task::spawn_blocking(move || snapshot::copy_database(&src, &dst))
            .await
            .map_err(|e| ArkivError::Internal(format!("backup task failed: {e}")))??;

        self.metrics.record_backup();
        info!(path = %target.display(), size_bytes = size, "backup complete");

        self.prune().await?;
        Ok(target)
    }

    /// Remove the oldest artifacts until at most `retain_count` remain.
    async fn prune(&self) -> Result<(), ArkivError> {
        let mut backups = self.list_backups().await?;
        while backups.len() > self.retain_count {
            let Some(oldest) = backups.pop() else { break };
            tokio::fs::remove_file(&oldest.path)
                .await
                .map_err(|e| ArkivError::Backup {
                    message: format!("cannot prune {}", oldest.path.display()),
                    source: Some(Box::new(e)),
                })?;
            info!(name = %oldest.name, "pruned old backup");
        }
        Ok(())
    }

    /// Enumerate artifacts, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, ArkivError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ArkivError::Backup {
                    message: format!("cannot read backup directory {}", self.dir.display()),
                    source: Some(Box::new(e)),
                });
            }
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ArkivError::Backup {
            message: "cannot enumerate backup directory".to_string(),
            source: Some(Box::new(e)),
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("backup_") {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            backups.push(BackupInfo {
                name,
                path: entry.path(),
                size_bytes: meta.len(),
                modified,
            });
        }

        backups.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(backups)
    }

    /// Overwrite the live store with the named artifact.
    ///
    /// The current live store is first copied to `<db>.pre-restore`, and the
    /// artifact is validated as an openable SQLite file, so a bad restore
    /// cannot destroy the only good copy. A missing artifact is a hard error.
    pub async fn restore(&self, name: &str) -> Result<(), ArkivError> {
        let artifact = self.dir.join(name);
        if !artifact.exists() {
            return Err(ArkivError::Backup {
                message: format!("backup not found: {}", artifact.display()),
                source: None,
            });
        }

        let db_path = self.db_path.clone();
        let result = tokio::task::spawn_blocking(move || {
            snapshot::validate_database(&artifact)?;
            if db_path.exists() {
                let safety = PathBuf::from(format!(
                    "{}{PRE_RESTORE_SUFFIX}",
                    db_path.to_string_lossy()
                ));
                snapshot::copy_database(&db_path, &safety)?;
            }
            snapshot::copy_database(&artifact, &db_path)?;
            Ok::<_, ArkivError>(())
        })
        .await
        .map_err(|e| ArkivError::Internal(format!("restore task failed: {e}")))?;
        result?;

        info!(name, "restore complete");
        Ok(())
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
