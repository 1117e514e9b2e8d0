// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level online copies of the store file.
//!
//! Uses rusqlite's Backup API for atomic, consistent copies that work even
//! while the database is being written to in WAL mode. The scheduled backup
//! manager and the restore path both build on these helpers.

use std::path::Path;
use std::time::Duration;

use arkiv_core::ArkivError;
use rusqlite::Connection;

/// Copy the database at `src` into `dst` through the online Backup API.
///
/// The source is opened read-only to minimize impact on the live writer;
/// 100 pages are copied per step with a 10 ms pause between steps so the
/// running instance can keep writing. Returns the size of the copy in bytes.
pub fn copy_database(src: &Path, dst: &Path) -> Result<u64, ArkivError> {
    if !src.exists() {
        return Err(ArkivError::Backup {
            message: format!("database not found: {}", src.display()),
            source: None,
        });
    }

    let src_conn = Connection::open_with_flags(
        src,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ArkivError::Backup {
        message: format!("cannot open source {}", src.display()),
        source: Some(Box::new(e)),
    })?;

    let mut dst_conn = Connection::open(dst).map_err(|e| ArkivError::Backup {
        message: format!("cannot open destination {}", dst.display()),
        source: Some(Box::new(e)),
    })?;

    let backup =
        rusqlite::backup::Backup::new(&src_conn, &mut dst_conn).map_err(|e| ArkivError::Backup {
            message: "backup handle creation failed".to_string(),
            source: Some(Box::new(e)),
        })?;

    backup
        .run_to_completion(100, Duration::from_millis(10), None)
        .map_err(|e| ArkivError::Backup {
            message: format!("copy to {} failed", dst.display()),
            source: Some(Box::new(e)),
        })?;
    drop(backup);
    drop(dst_conn);

    std::fs::metadata(dst)
        .map(|m| m.len())
        .map_err(|e| ArkivError::Backup {
            message: format!("cannot stat {}", dst.display()),
            source: Some(Box::new(e)),
        })
}

/// Verify that `path` is an openable SQLite database.
///
/// Used before a restore so an arbitrary file cannot clobber the live store.
pub fn validate_database(path: &Path) -> Result<(), ArkivError> {
    let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| ArkivError::Backup {
            message: format!("{} is not openable", path.display()),
            source: Some(Box::new(e)),
        })?;
    conn.execute_batch("SELECT 1").map_err(|e| ArkivError::Backup {
        message: format!("{} is not a valid SQLite database", path.display()),
        source: Some(Box::new(e)),
    })?;
    Ok(())
}
