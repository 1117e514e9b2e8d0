// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The archiver: composes WAL, store, buffered writer, backup, cleanup, and
//! the health surface into one lifecycle.
//!
//! Every collaborator is an explicit instance owned by the [`Archiver`] —
//! no process-wide state — so tests instantiate isolated archivers against
//! scratch directories. External adapters use only this type: convert the
//! native payload into an [`ArchiveMessage`] and call [`Archiver::archive`]
//! or [`Archiver::archive_batch`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arkiv_config::ArkivConfig;
use arkiv_core::{ArchiveMessage, ArchiveStats, ArkivError, RetentionOutcome};
use arkiv_health::{ArchiveMetrics, HealthCheck, HealthServer, HealthState, probes};
use arkiv_store::{Database, queries};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::backup::BackupManager;
use crate::cleanup::CleanupManager;
use crate::wal::WriteAheadLog;
use crate::writer::ArchiveWriter;

/// Startup refuses to run at or above this disk usage.
const DISK_PREFLIGHT_LIMIT_PCT: f64 = 95.0;
/// `/health` reports the disk check as failing at or above this usage.
const DISK_CHECK_LIMIT_PCT: f64 = 90.0;
/// `/health` reports the memory check as failing at or above this usage.
const MEMORY_CHECK_LIMIT_PCT: f64 = 85.0;
/// Default cap for content search results.
const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Durable message archiver. See the crate docs for the data path.
pub struct Archiver {
    db: Arc<Database>,
    wal: Arc<WriteAheadLog>,
    writer: Arc<ArchiveWriter>,
    backup: Arc<BackupManager>,
    cleanup: Arc<CleanupManager>,
    metrics: Arc<ArchiveMetrics>,
    health: tokio::sync::Mutex<Option<HealthServer>>,
    health_addr: SocketAddr,
    store_open: Arc<AtomicBool>,
    wal_ready: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl Archiver {
    /// Bring the whole engine up: disk pre-flight, WAL init, store open,
    /// WAL recovery, background schedules, health listener.
    pub async fn init(config: ArkivConfig) -> Result<Arc<Self>, ArkivError> {
        let db_path = PathBuf::from(&config.storage.database_path);

        // Pre-flight: refuse to start on a nearly full disk. Archiving onto
        // a disk this full risks corrupting both the store and its WAL.
        if let Some(pct) = probes::disk_usage_pct(&existing_ancestor(&db_path)) {
            if pct >= DISK_PREFLIGHT_LIMIT_PCT {
                return Err(ArkivError::DiskFull {
                    usage_pct: pct,
                    limit_pct: DISK_PREFLIGHT_LIMIT_PCT,
                });
            }
        }

        let wal = Arc::new(WriteAheadLog::new(config.storage.wal_path()));
        wal.init().await?;

        let db = Arc::new(Database::open(&db_path).await?);

        // Recovery: messages appended to the WAL but never flushed before
        // the last shutdown are replayed into the store exactly once.
        let pending = wal.read_uncommitted().await?;
        if !pending.is_empty() {
            info!(count = pending.len(), "recovering unflushed messages from write-ahead log");
            queries::messages::insert_batch(&db, &pending).await?;
            wal.clear().await?;
        }

        let metrics = Arc::new(ArchiveMetrics::new());

        let writer = Arc::new(ArchiveWriter::new(
            wal.clone(),
            db.clone(),
            metrics.clone(),
            &config.writer,
        ));
        writer.start();

        let backup = Arc::new(BackupManager::new(&config.backup, &db_path, metrics.clone()));
        backup.start();

        let cleanup = Arc::new(CleanupManager::new(&config.cleanup, db.clone()));
        cleanup.start();

        let store_open = Arc::new(AtomicBool::new(true));
        let wal_ready = Arc::new(AtomicBool::new(true));
        let checks = build_checks(
            store_open.clone(),
            wal_ready.clone(),
            writer.clone(),
            db_path.clone(),
            config.writer.buffer_size,
        );
        let health = HealthServer::start(
            &config.health.host,
            config.health.port,
            HealthState {
                checks,
                metrics: metrics.clone(),
                start_time: Instant::now(),
            },
        )
        .await?;
        let health_addr = health.addr();

        info!("archiver initialized");
        Ok(Arc::new(Self {
            db,
            wal,
            writer,
            backup,
            cleanup,
            metrics,
            health: tokio::sync::Mutex::new(Some(health)),
            health_addr,
            store_open,
            wal_ready,
            closed: AtomicBool::new(false),
        }))
    }

    /// Address of the health listener (useful with port 0).
    pub fn health_addr(&self) -> SocketAddr {
        self.health_addr
    }

    /// Durably archive one message.
    pub async fn archive(&self, message: ArchiveMessage) -> Result<(), ArkivError> {
        self.writer.add(message).await
    }

    /// Durably archive a set of messages. Per-message failures are logged
    /// and isolated — one bad message never blocks the rest. Returns the
    /// number accepted.
    pub async fn archive_batch(&self, messages: Vec<ArchiveMessage>) -> usize {
        self.writer.add_batch(messages).await
    }

    /// Force a flush of the live buffer, outside the timer.
    pub async fn flush_now(&self) -> Result<bool, ArkivError> {
        self.writer.flush().await
    }

    /// Messages within the inclusive time range, optionally scoped to one
    /// chat, most recent first.
    pub async fn query_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        chat_id: Option<&str>,
    ) -> Result<Vec<ArchiveMessage>, ArkivError> {
        let started = Instant::now();
        match queries::messages::query_by_time_range(&self.db, start, end, chat_id).await {
            Ok(rows) => {
                self.metrics.record_query(started.elapsed().as_millis() as u64);
                Ok(rows)
            }
            Err(e) => {
                error!(error = %e, "time-range query failed");
                Err(e)
            }
        }
    }

    /// Case-insensitive content search, most recent first. `limit` defaults
    /// to 100.
    pub async fn search(
        &self,
        keyword: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ArchiveMessage>, ArkivError> {
        let started = Instant::now();
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        match queries::messages::search_content(&self.db, keyword, limit).await {
            Ok(rows) => {
                self.metrics.record_query(started.elapsed().as_millis() as u64);
                Ok(rows)
            }
            Err(e) => {
                error!(error = %e, keyword, "content search failed");
                Err(e)
            }
        }
    }

    /// Aggregate statistics over the archive.
    pub async fn stats(&self) -> Result<ArchiveStats, ArkivError> {
        let started = Instant::now();
        match queries::messages::stats(&self.db).await {
            Ok(stats) => {
                self.metrics.record_query(started.elapsed().as_millis() as u64);
                Ok(stats)
            }
            Err(e) => {
                error!(error = %e, "stats query failed");
                Err(e)
            }
        }
    }

    /// Trigger one backup outside the schedule.
    pub async fn backup_now(&self) -> Result<PathBuf, ArkivError> {
        info!("manual backup requested");
        self.backup.perform_backup().await
    }

    /// Trigger one cleanup pass outside the schedule.
    pub async fn cleanup_now(&self) -> Result<RetentionOutcome, ArkivError> {
        info!("manual cleanup requested");
        self.cleanup.perform_cleanup().await
    }

    /// The backup manager, for artifact listing and restores.
    pub fn backups(&self) -> &BackupManager {
        &self.backup
    }

    /// Orderly shutdown: health → backup → cleanup → writer (final flush) →
    /// WAL → store. Idempotent — a second call while one is running is a
    /// no-op, so signal handlers and error paths can both invoke it.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("close already performed");
            return;
        }
        info!("shutting down archiver");

        if let Some(health) = self.health.lock().await.take() {
            health.stop().await;
        }
        self.backup.stop().await;
        self.cleanup.stop().await;

        if let Err(e) = self.writer.close().await {
            // The WAL still holds these messages; the next startup replays them.
            warn!(error = %e, "final flush failed, messages remain recoverable");
        }

        self.wal.close().await;
        self.wal_ready.store(false, Ordering::Relaxed);

        if let Err(e) = self.db.close().await {
            warn!(error = %e, "store close failed");
        }
        self.store_open.store(false, Ordering::Relaxed);

        info!("archiver shutdown complete");
    }
}

/// Deepest existing ancestor of `path`, for disk probes on files that may
/// not exist yet.
fn existing_ancestor(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if !ancestor.as_os_str().is_empty() && ancestor.exists() {
            return ancestor.to_path_buf();
        }
    }
    PathBuf::from("/")
}

/// Assemble the `/health` checks closure over live engine state.
fn build_checks(
    store_open: Arc<AtomicBool>,
    wal_ready: Arc<AtomicBool>,
    writer: Arc<ArchiveWriter>,
    db_path: PathBuf,
    buffer_size: usize,
) -> Arc<dyn Fn() -> Vec<HealthCheck> + Send + Sync> {
    Arc::new(move || {
        let mut checks = Vec::with_capacity(5);

        let open = store_open.load(Ordering::Relaxed) && db_path.exists();
        checks.push(if open {
            HealthCheck::pass("store", None)
        } else {
            HealthCheck::fail("store", "store closed or file missing")
        });

        checks.push(if wal_ready.load(Ordering::Relaxed) {
            HealthCheck::pass("wal", None)
        } else {
            HealthCheck::fail("wal", "write-ahead log not initialized")
        });

        let buffered = writer.buffered_len();
        checks.push(if buffered < buffer_size {
            HealthCheck::pass("buffer", Some(format!("{buffered}/{buffer_size} buffered")))
        } else {
            HealthCheck::fail("buffer", format!("{buffered}/{buffer_size} buffered"))
        });

        checks.push(match probes::disk_usage_pct(&existing_ancestor(&db_path)) {
            Some(pct) if pct >= DISK_CHECK_LIMIT_PCT => HealthCheck::fail(
                "disk",
                format!("{pct:.1}% used, threshold {DISK_CHECK_LIMIT_PCT:.0}%"),
            ),
            Some(pct) => HealthCheck::pass("disk", Some(format!("{pct:.1}% used"))),
            None => HealthCheck::pass("disk", Some("usage unavailable".to_string())),
        });

        checks.push(match probes::memory_usage_pct() {
            Some(pct) if pct >= MEMORY_CHECK_LIMIT_PCT => HealthCheck::fail(
                "memory",
                format!("{pct:.1}% used, threshold {MEMORY_CHECK_LIMIT_PCT:.0}%"),
            ),
            Some(pct) => HealthCheck::pass("memory", Some(format!("{pct:.1}% used"))),
            None => HealthCheck::pass("memory", Some("usage unavailable".to_string())),
        });

        checks
    })
}
