// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: the `Database` struct IS the single writer. Query functions
//! accept `&Database` and call through `database.connection().call()`.
//! Do NOT create additional Connection instances for writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arkiv_core::ArkivError;
use tracing::info;

use crate::migrations;

/// Handle to the analytical store.
///
/// One instance per store path per process. Cloning the inner connection is
/// cheap (it is a channel to the single writer thread); the handle itself is
/// shared via `Arc`.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl Database {
    /// Open (creating if absent) the store at `path`, apply PRAGMAs, and run
    /// schema migrations. Idempotent against an already-migrated store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ArkivError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(ArkivError::storage)?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(map_tr_err)?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        info!(path = %path.display(), "analytical store opened");
        Ok(Self { conn, path })
    }

    /// The underlying single-writer connection handle.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Filesystem path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the store file in bytes, if it exists.
    pub fn file_size(&self) -> Result<u64, ArkivError> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(ArkivError::storage)
    }

    /// Close the store, releasing the writer thread and its handle.
    pub async fn close(&self) -> Result<(), ArkivError> {
        self.conn
            .clone()
            .close()
            .await
            .map_err(map_tr_err)?;
        info!(path = %self.path.display(), "analytical store closed");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> ArkivError {
    ArkivError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).await.unwrap();

        assert!(db_path.exists());

        // Schema should be queryable.
        let count: i64 = db
            .connection()
            .call(|conn| {
                let n = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let db = Database::open(&db_path).await.unwrap();
        db.close().await.unwrap();

        // Second open must not fail on existing schema.
        let db = Database::open(&db_path).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_missing_parent_dirs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/test.db");
        let db = Database::open(&db_path).await.unwrap();
        assert!(db_path.exists());
        db.close().await.unwrap();
    }
}
