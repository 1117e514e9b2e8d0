// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only write-ahead log for not-yet-persisted messages.
//!
//! One newline-delimited JSON record per message, written and fsynced
//! before the archiver acknowledges the message. The log has no index and
//! is read only sequentially, only during startup recovery. Records are
//! dropped either wholesale (`clear`) or by releasing a counted prefix
//! (`release`), so entries appended while a flush is in flight survive
//! that flush's cleanup.

use std::path::{Path, PathBuf};

use arkiv_core::{ArchiveMessage, ArkivError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One log line: the message plus its append-time marker (unix millis).
#[derive(Debug, Serialize, Deserialize)]
struct WalRecord {
    #[serde(flatten)]
    message: ArchiveMessage,
    wal_ts: i64,
}

struct WalInner {
    file: Option<tokio::fs::File>,
    /// Records currently in the file. Maintained in-process; restored by
    /// counting lines on `init`.
    records: u64,
}

/// Durable append-only record of messages not yet confirmed in the store.
pub struct WriteAheadLog {
    path: PathBuf,
    inner: Mutex<WalInner>,
}

impl WriteAheadLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(WalInner {
                file: None,
                records: 0,
            }),
        }
    }

    /// Filesystem path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (creating if absent) the append-mode log stream.
    ///
    /// Counts any records already on disk so prefix releases stay accurate
    /// after a restart.
    pub async fn init(&self) -> Result<(), ArkivError> {
        let mut inner = self.inner.lock().await;
        if inner.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ArkivError::wal("cannot create log directory", e))?;
            }
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ArkivError::wal("cannot open log file", e))?;

        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content.lines().filter(|l| !l.trim().is_empty()).count() as u64,
            Err(_) => 0,
        };

        inner.file = Some(file);
        inner.records = existing;
        info!(path = %self.path.display(), records = existing, "write-ahead log opened");
        Ok(())
    }

    /// Append one message. Acknowledged only after the write is fsynced.
    pub async fn append(&self, message: &ArchiveMessage) -> Result<(), ArkivError> {
        let mut inner = self.inner.lock().await;
        let file = inner.file.as_mut().ok_or_else(|| ArkivError::Wal {
            message: "log not initialized".to_string(),
            source: None,
        })?;

        let record = WalRecord {
            message: message.clone(),
            wal_ts: Utc::now().timestamp_millis(),
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| ArkivError::wal("cannot serialize record", e))?;
        line.push('\n');

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ArkivError::wal("append failed", e))?;
        file.sync_data()
            .await
            .map_err(|e| ArkivError::wal("sync failed", e))?;
        inner.records += 1;
        Ok(())
    }

    /// Sequential per-message append. Not atomic as a whole: a crash
    /// mid-batch leaves a valid prefix, which recovery replays.
    pub async fn append_batch(&self, messages: &[ArchiveMessage]) -> Result<(), ArkivError> {
        for message in messages {
            self.append(message).await?;
        }
        Ok(())
    }

    /// Number of records currently in the log.
    pub async fn record_count(&self) -> u64 {
        self.inner.lock().await.records
    }

    /// Parse the log into messages for recovery.
    ///
    /// A malformed or partial trailing line (crash mid-write) is skipped
    /// with a warning rather than treated as fatal, so one corrupt line
    /// cannot block recovery of the rest.
    pub async fn read_uncommitted(&self) -> Result<Vec<ArchiveMessage>, ArkivError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArkivError::wal("cannot read log", e)),
        };

        let mut messages = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalRecord>(line) {
                Ok(record) => messages.push(record.message),
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "skipping malformed log line");
                }
            }
        }
        Ok(messages)
    }

    /// Delete everything: close the stream, remove the file, reopen empty.
    ///
    /// Only valid once every record in the log is confirmed durably
    /// persisted (recovery replay, or a flush whose mark covered the file).
    pub async fn clear(&self) -> Result<(), ArkivError> {
        let mut inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(ArkivError::Wal {
                message: "log not initialized".to_string(),
                source: None,
            });
        }
        inner.file = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ArkivError::wal("cannot remove log file", e)),
        }
        inner.file = Some(
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| ArkivError::wal("cannot reopen log file", e))?,
        );
        inner.records = 0;
        debug!(path = %self.path.display(), "write-ahead log cleared");
        Ok(())
    }

    /// Release the first `mark` records: the prefix a successful flush just
    /// persisted. Records appended after the mark (the generation that
    /// accumulated during the flush) are kept.
    pub async fn release(&self, mark: u64) -> Result<(), ArkivError> {
        if mark == 0 {
            return Ok(());
        }
        let mut inner = self.inner.lock().await;
        if inner.file.is_none() {
            return Err(ArkivError::Wal {
                message: "log not initialized".to_string(),
                source: None,
            });
        }

        if mark >= inner.records {
            // The mark covers the whole file: plain truncation.
            inner.file = None;
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ArkivError::wal("cannot remove log file", e)),
            }
            inner.file = Some(
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|e| ArkivError::wal("cannot reopen log file", e))?,
            );
            inner.records = 0;
            return Ok(());
        }

        // Keep the suffix: rewrite through a temp file and rename over the
        // log so a crash mid-release leaves either the old or the new file,
        // never a torn one.
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ArkivError::wal("cannot read log", e))?;
        let mut remaining: String = String::new();
        for line in content.lines().skip(mark as usize) {
            remaining.push_str(line);
            remaining.push('\n');
        }

        let tmp = self.path.with_extension("tmp");
        let mut tmp_file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| ArkivError::wal("cannot create temp log", e))?;
        tmp_file
            .write_all(remaining.as_bytes())
            .await
            .map_err(|e| ArkivError::wal("cannot write temp log", e))?;
        tmp_file
            .sync_data()
            .await
            .map_err(|e| ArkivError::wal("cannot sync temp log", e))?;
        drop(tmp_file);

        inner.file = None;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ArkivError::wal("cannot swap in compacted log", e))?;
        inner.file = Some(
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| ArkivError::wal("cannot reopen log file", e))?,
        );
        inner.records -= mark;
        debug!(released = mark, remaining = inner.records, "released flushed log records");
        Ok(())
    }

    /// Stop the stream without deleting content. Used when a final flush
    /// was not guaranteed, so the on-disk records stay recoverable.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.file = None;
        debug!(path = %self.path.display(), "write-ahead log closed");
    }
}
