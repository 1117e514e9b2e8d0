// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Arkiv archival engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. Every field has a default so an empty config
//! file (or none at all) yields a working archiver.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Arkiv configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArkivConfig {
    /// Process-level settings (logging).
    #[serde(default)]
    pub archiver: ArchiverConfig,

    /// Analytical store and WAL paths.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Buffered writer settings.
    #[serde(default)]
    pub writer: WriterConfig,

    /// Scheduled backup settings.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Retention cleanup settings.
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Health endpoint settings.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiverConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Analytical store and WAL path configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Path to the write-ahead log. Defaults to `<database_path>.wal`.
    #[serde(default)]
    pub wal_path: Option<String>,
}

impl StorageConfig {
    /// Effective WAL path: explicit setting, or co-located with the store.
    pub fn wal_path(&self) -> PathBuf {
        match &self.wal_path {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from(format!("{}.wal", self.database_path)),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_path: None,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("arkiv").join("archive.db"))
        .unwrap_or_else(|| PathBuf::from("archive.db"))
        .to_string_lossy()
        .into_owned()
}

/// Buffered writer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WriterConfig {
    /// Number of buffered messages that triggers an immediate flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Interval of the periodic flush timer, in seconds.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

fn default_buffer_size() -> usize {
    100
}

fn default_flush_interval_secs() -> u64 {
    300 // 5 minutes
}

/// Scheduled backup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Enable the periodic backup schedule.
    #[serde(default = "default_backup_enabled")]
    pub enabled: bool,

    /// Directory for backup artifacts. Defaults to `backups/` next to the
    /// database file.
    #[serde(default)]
    pub dir: Option<String>,

    /// Hours between scheduled backups.
    #[serde(default = "default_backup_interval_hours")]
    pub interval_hours: u64,

    /// Number of most-recent artifacts to retain.
    #[serde(default = "default_backup_retain_count")]
    pub retain_count: usize,
}

impl BackupConfig {
    /// Effective backup directory: explicit setting, or a sibling of the store.
    pub fn dir(&self, database_path: &str) -> PathBuf {
        match &self.dir {
            Some(d) => PathBuf::from(d),
            None => PathBuf::from(database_path)
                .parent()
                .map(|p| p.join("backups"))
                .unwrap_or_else(|| PathBuf::from("backups")),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_backup_enabled(),
            dir: None,
            interval_hours: default_backup_interval_hours(),
            retain_count: default_backup_retain_count(),
        }
    }
}

fn default_backup_enabled() -> bool {
    true
}

fn default_backup_interval_hours() -> u64 {
    24
}

fn default_backup_retain_count() -> usize {
    7
}

/// Retention cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Enable the daily cleanup schedule.
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,

    /// Messages older than this many days are deleted (or archived first).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Alert-only size ceiling for the store file, in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Export rows to cold-archive files before deleting them.
    #[serde(default)]
    pub archive_enabled: bool,

    /// Directory for cold-archive files. Defaults to `archive/` next to the
    /// database file.
    #[serde(default)]
    pub archive_dir: Option<String>,
}

impl CleanupConfig {
    /// Effective archive directory: explicit setting, or a sibling of the store.
    pub fn archive_dir(&self, database_path: &str) -> PathBuf {
        match &self.archive_dir {
            Some(d) => PathBuf::from(d),
            None => PathBuf::from(database_path)
                .parent()
                .map(|p| p.join("archive"))
                .unwrap_or_else(|| PathBuf::from("archive")),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_cleanup_enabled(),
            retention_days: default_retention_days(),
            max_size_mb: default_max_size_mb(),
            archive_enabled: false,
            archive_dir: None,
        }
    }
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    90
}

fn default_max_size_mb() -> u64 {
    1024
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Host address to bind.
    #[serde(default = "default_health_host")]
    pub host: String,

    /// Port to bind. Port 0 binds an ephemeral port (used in tests).
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

fn default_health_host() -> String {
    "127.0.0.1".to_string()
}

fn default_health_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ArkivConfig::default();
        assert_eq!(config.writer.buffer_size, 100);
        assert_eq!(config.writer.flush_interval_secs, 300);
        assert_eq!(config.health.port, 8080);
        assert_eq!(config.backup.interval_hours, 24);
        assert_eq!(config.backup.retain_count, 7);
        assert_eq!(config.cleanup.retention_days, 90);
        assert!(!config.cleanup.archive_enabled);
    }

    #[test]
    fn wal_path_defaults_to_colocated() {
        let storage = StorageConfig {
            database_path: "/data/arkiv/archive.db".into(),
            wal_path: None,
        };
        assert_eq!(
            storage.wal_path(),
            PathBuf::from("/data/arkiv/archive.db.wal")
        );
    }

    #[test]
    fn wal_path_respects_override() {
        let storage = StorageConfig {
            database_path: "/data/arkiv/archive.db".into(),
            wal_path: Some("/fast-disk/archive.wal".into()),
        };
        assert_eq!(storage.wal_path(), PathBuf::from("/fast-disk/archive.wal"));
    }

    #[test]
    fn backup_dir_defaults_next_to_database() {
        let backup = BackupConfig::default();
        assert_eq!(
            backup.dir("/data/arkiv/archive.db"),
            PathBuf::from("/data/arkiv/backups")
        );
    }

    #[test]
    fn archive_dir_defaults_next_to_database() {
        let cleanup = CleanupConfig::default();
        assert_eq!(
            cleanup.archive_dir("/data/arkiv/archive.db"),
            PathBuf::from("/data/arkiv/archive")
        );
    }
}
