// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Arkiv archival engine.

use thiserror::Error;

/// The primary error type used across all Arkiv components.
#[derive(Debug, Error)]
pub enum ArkivError {
    /// Configuration errors (invalid TOML, unknown keys, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Analytical store errors (connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Write-ahead log errors (uninitialized stream, append/compaction I/O).
    #[error("write-ahead log error: {message}")]
    Wal {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Backup and restore errors (missing artifact, copy failure).
    #[error("backup error: {message}")]
    Backup {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Startup pre-flight failure: the data disk is too full to archive safely.
    #[error("disk usage {usage_pct:.1}% is above the startup limit of {limit_pct:.0}%")]
    DiskFull { usage_pct: f64, limit_pct: f64 },

    /// Health endpoint errors (bind failure, listener error).
    #[error("health server error: {0}")]
    Health(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ArkivError {
    /// Wrap an arbitrary error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ArkivError::Storage {
            source: Box::new(source),
        }
    }

    /// Build a WAL error with an underlying cause.
    pub fn wal<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ArkivError::Wal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_variants_construct() {
        let _config = ArkivError::Config("bad key".into());
        let _storage = ArkivError::storage(std::io::Error::other("boom"));
        let _wal = ArkivError::wal("append failed", std::io::Error::other("boom"));
        let _backup = ArkivError::Backup {
            message: "missing artifact".into(),
            source: None,
        };
        let _disk = ArkivError::DiskFull {
            usage_pct: 97.2,
            limit_pct: 95.0,
        };
        let _health = ArkivError::Health("bind failed".into());
        let _internal = ArkivError::Internal("unexpected".into());
    }

    #[test]
    fn disk_full_message_carries_percentages() {
        let err = ArkivError::DiskFull {
            usage_pct: 96.5,
            limit_pct: 95.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("96.5%"));
        assert!(msg.contains("95%"));
    }

    #[test]
    fn storage_error_displays_source() {
        let err = ArkivError::storage(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
    }
}
