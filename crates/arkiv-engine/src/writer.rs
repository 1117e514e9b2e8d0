// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffered writer: coalesces messages in memory and drains them into the
//! store in batches, with the write-ahead log as the safety net.
//!
//! At most one flush is in flight at any instant, guarded by an in-progress
//! flag. WAL appends and buffer pushes happen under one mutex, so the WAL
//! mark taken at detach time counts exactly the records whose messages are
//! in the detached generation — messages added during an in-flight flush
//! join the next generation and keep their log entries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use arkiv_config::model::WriterConfig;
use arkiv_core::{ArchiveMessage, ArkivError};
use arkiv_health::ArchiveMetrics;
use arkiv_store::{Database, queries};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::wal::WriteAheadLog;

/// Coalescing writer in front of the analytical store.
pub struct ArchiveWriter {
    wal: Arc<WriteAheadLog>,
    db: Arc<Database>,
    metrics: Arc<ArchiveMetrics>,
    buffer: tokio::sync::Mutex<Vec<ArchiveMessage>>,
    /// Mirror of the live buffer length, readable without the async lock.
    buffered: AtomicUsize,
    flushing: AtomicBool,
    buffer_size: usize,
    flush_interval: Duration,
    cancel: CancellationToken,
    timer: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ArchiveWriter {
    pub fn new(
        wal: Arc<WriteAheadLog>,
        db: Arc<Database>,
        metrics: Arc<ArchiveMetrics>,
        config: &WriterConfig,
    ) -> Self {
        Self {
            wal,
            db,
            metrics,
            buffer: tokio::sync::Mutex::new(Vec::new()),
            buffered: AtomicUsize::new(0),
            flushing: AtomicBool::new(false),
            buffer_size: config.buffer_size,
            flush_interval: Duration::from_secs(config.flush_interval_secs),
            cancel: CancellationToken::new(),
            timer: std::sync::Mutex::new(None),
        }
    }

    /// Messages currently waiting in the live buffer.
    pub fn buffered_len(&self) -> usize {
        self.buffered.load(Ordering::Relaxed)
    }

    /// Durably enqueue one message: WAL append, then buffer. Reaching the
    /// size threshold triggers an immediate flush.
    pub async fn add(&self, message: ArchiveMessage) -> Result<(), ArkivError> {
        {
            let mut buffer = self.buffer.lock().await;
            self.wal.append(&message).await?;
            buffer.push(message);
            self.buffered.store(buffer.len(), Ordering::Relaxed);
        }
        self.metrics.record_message();
        self.maybe_flush_on_threshold().await;
        Ok(())
    }

    /// Durably enqueue a set of messages with per-message error isolation:
    /// a failed WAL append is logged and skips that message only. Returns
    /// the number of messages accepted.
    pub async fn add_batch(&self, messages: Vec<ArchiveMessage>) -> usize {
        let mut accepted = 0;
        {
            let mut buffer = self.buffer.lock().await;
            for message in messages {
                match self.wal.append(&message).await {
                    Ok(()) => {
                        buffer.push(message);
                        accepted += 1;
                        self.metrics.record_message();
                    }
                    Err(e) => {
                        error!(id = %message.id, error = %e, "log append failed, message dropped from batch");
                    }
                }
            }
            self.buffered.store(buffer.len(), Ordering::Relaxed);
        }
        self.maybe_flush_on_threshold().await;
        accepted
    }

    async fn maybe_flush_on_threshold(&self) {
        if self.buffered.load(Ordering::Relaxed) >= self.buffer_size {
            if let Err(e) = self.flush().await {
                warn!(error = %e, "threshold flush failed, batch requeued for next tick");
            }
        }
    }

    /// Drain the live buffer into the store as one batch.
    ///
    /// Returns `Ok(false)` when nothing was done (already flushing, or
    /// empty buffer). On store failure the detached batch is prepended back
    /// onto the live buffer in order, the WAL is left untouched, and the
    /// error is returned for the caller to log; the periodic timer retries.
    pub async fn flush(&self) -> Result<bool, ArkivError> {
        if self.flushing.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let result = self.flush_detached().await;
        self.flushing.store(false, Ordering::SeqCst);
        result
    }

    async fn flush_detached(&self) -> Result<bool, ArkivError> {
        let (batch, mark) = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return Ok(false);
            }
            let mark = self.wal.record_count().await;
            let batch = std::mem::take(&mut *buffer);
            self.buffered.store(0, Ordering::Relaxed);
            (batch, mark)
        };

        debug!(count = batch.len(), "flushing batch to store");
        match queries::messages::insert_batch(&self.db, &batch).await {
            Ok(n) => {
                if let Err(e) = self.wal.release(mark).await {
                    // The batch is already durable in the store; a stale
                    // log entry only means an idempotent replay later.
                    warn!(error = %e, "failed to release flushed log records");
                }
                self.metrics.record_flush(true);
                info!(count = n, "flushed batch to store");
                Ok(true)
            }
            Err(e) => {
                self.metrics.record_flush(false);
                let mut buffer = self.buffer.lock().await;
                let mut requeued = batch;
                requeued.extend(buffer.drain(..));
                *buffer = requeued;
                self.buffered.store(buffer.len(), Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Start the periodic flush timer, bounding worst-case staleness.
    pub fn start(self: &Arc<Self>) {
        let writer = Arc::clone(self);
        let cancel = self.cancel.clone();
        let period = self.flush_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the immediate first tick.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = writer.flush().await {
                            warn!(error = %e, "periodic flush failed, will retry next tick");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("flush timer stopped");
                        break;
                    }
                }
            }
        });
        *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(
            buffer_size = self.buffer_size,
            interval_secs = period.as_secs(),
            "buffered writer started"
        );
    }

    /// Stop the timer and perform one final flush.
    pub async fn close(&self) -> Result<(), ArkivError> {
        self.cancel.cancel();
        let handle = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        match self.flush().await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(error = %e, "final flush failed, unflushed messages remain in the log");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn make_msg(id: &str, offset_secs: i64) -> ArchiveMessage {
        ArchiveMessage {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
                + chrono::Duration::seconds(offset_secs),
            channel: "test".to_string(),
            chat_id: "c1".to_string(),
            chat_name: None,
            user_id: "u1".to_string(),
            user_name: "alice".to_string(),
            content: format!("content {id}"),
            is_mentioned: false,
            reply_to: None,
            metadata: None,
        }
    }

    async fn setup(buffer_size: usize) -> (Arc<ArchiveWriter>, Arc<Database>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Arc::new(Database::open(dir.path().join("test.db")).await.unwrap());
        let wal = Arc::new(WriteAheadLog::new(dir.path().join("test.db.wal")));
        wal.init().await.unwrap();
        let config = WriterConfig {
            buffer_size,
            flush_interval_secs: 3600,
        };
        let writer = Arc::new(ArchiveWriter::new(
            wal,
            db.clone(),
            Arc::new(ArchiveMetrics::new()),
            &config,
        ));
        (writer, db, dir)
    }

    async fn store_count(db: &Database) -> i64 {
        db.connection()
            .call(|conn| {
                let n = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn below_threshold_stays_buffered() {
        let (writer, db, _dir) = setup(3).await;

        writer.add(make_msg("m1", 0)).await.unwrap();
        writer.add(make_msg("m2", 1)).await.unwrap();

        assert_eq!(writer.buffered_len(), 2);
        assert_eq!(store_count(&db).await, 0, "no flush before the threshold");
    }

    #[tokio::test]
    async fn threshold_triggers_immediate_flush() {
        let (writer, db, _dir) = setup(3).await;

        for (i, id) in ["m1", "m2", "m3"].iter().enumerate() {
            writer.add(make_msg(id, i as i64)).await.unwrap();
        }

        assert_eq!(store_count(&db).await, 3);
        assert_eq!(writer.buffered_len(), 0);
    }

    #[tokio::test]
    async fn explicit_flush_drains_and_releases_wal() {
        let (writer, db, dir) = setup(100).await;

        writer.add(make_msg("m1", 0)).await.unwrap();
        assert!(writer.flush().await.unwrap());

        assert_eq!(store_count(&db).await, 1);
        // The WAL no longer holds the flushed record.
        let wal = WriteAheadLog::new(dir.path().join("test.db.wal"));
        assert!(wal.read_uncommitted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flush_empty_buffer_is_noop() {
        let (writer, _db, _dir) = setup(100).await;
        assert!(!writer.flush().await.unwrap());
    }

    #[tokio::test]
    async fn failed_flush_requeues_in_order() {
        let (writer, db, dir) = setup(100).await;

        writer.add(make_msg("m1", 0)).await.unwrap();
        writer.add(make_msg("m2", 1)).await.unwrap();

        // Force a store failure: close the database out from under the writer.
        db.close().await.unwrap();

        assert!(writer.flush().await.is_err());
        assert_eq!(writer.buffered_len(), 2, "batch requeued");

        // The WAL still holds both records for recovery.
        let wal = WriteAheadLog::new(dir.path().join("test.db.wal"));
        let pending = wal.read_uncommitted().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn add_batch_accepts_all_and_counts() {
        let (writer, db, _dir) = setup(100).await;

        let accepted = writer
            .add_batch(vec![make_msg("m1", 0), make_msg("m2", 1), make_msg("m3", 2)])
            .await;
        assert_eq!(accepted, 3);
        assert_eq!(writer.buffered_len(), 3);

        writer.flush().await.unwrap();
        assert_eq!(store_count(&db).await, 3);
    }

    #[tokio::test]
    async fn close_performs_final_flush() {
        let (writer, db, _dir) = setup(100).await;
        writer.start();

        writer.add(make_msg("m1", 0)).await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(store_count(&db).await, 1);
    }
}
