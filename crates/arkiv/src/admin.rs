// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot administrative commands: backup, restore, artifact listing,
//! retention cleanup, and archive statistics.
//!
//! These run without the serve loop. Snapshots use the online Backup API,
//! so they are safe against a store that a running archiver is writing to.
//! Restoring over a running archiver is not safe; stop it first.

use std::path::Path;
use std::sync::Arc;

use arkiv_config::ArkivConfig;
use arkiv_core::ArkivError;
use arkiv_engine::{BackupManager, CleanupManager};
use arkiv_health::ArchiveMetrics;
use arkiv_store::{Database, queries};

fn backup_manager(config: &ArkivConfig) -> BackupManager {
    BackupManager::new(
        &config.backup,
        Path::new(&config.storage.database_path),
        Arc::new(ArchiveMetrics::new()),
    )
}

/// `arkiv backup`: snapshot the store now and prune old artifacts.
pub async fn run_backup(config: &ArkivConfig) -> Result<(), ArkivError> {
    let manager = backup_manager(config);
    let path = manager.perform_backup().await?;
    let size_mb = std::fs::metadata(&path)
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);
    println!("backup complete: {size_mb:.1} MB written to {}", path.display());
    Ok(())
}

/// `arkiv backups`: list artifacts, newest first.
pub async fn run_backups(config: &ArkivConfig) -> Result<(), ArkivError> {
    let manager = backup_manager(config);
    let backups = manager.list_backups().await?;
    if backups.is_empty() {
        println!("no backups in {}", manager.dir().display());
        return Ok(());
    }
    for info in backups {
        let size_mb = info.size_bytes as f64 / (1024.0 * 1024.0);
        println!(
            "{}  {:>8.1} MB  {}",
            info.modified.format("%Y-%m-%d %H:%M:%S"),
            size_mb,
            info.name
        );
    }
    Ok(())
}

/// `arkiv restore <name>`: overwrite the live store from an artifact.
pub async fn run_restore(config: &ArkivConfig, name: &str) -> Result<(), ArkivError> {
    let manager = backup_manager(config);
    manager.restore(name).await?;
    println!(
        "restore complete: {} -> {}",
        name, config.storage.database_path
    );
    println!(
        "previous store saved as {}.pre-restore",
        config.storage.database_path
    );
    Ok(())
}

/// `arkiv cleanup`: one retention pass, with the size-ceiling check.
pub async fn run_cleanup(config: &ArkivConfig) -> Result<(), ArkivError> {
    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    let manager = CleanupManager::new(&config.cleanup, db.clone());

    let outcome = manager.perform_cleanup().await?;
    println!(
        "cleanup complete: {} deleted, {} archived (retention {} days)",
        outcome.deleted, outcome.archived, config.cleanup.retention_days
    );

    if manager.check_db_size()? {
        println!(
            "note: store exceeds the configured {} MB ceiling",
            config.cleanup.max_size_mb
        );
    }

    db.close().await?;
    Ok(())
}

/// `arkiv stats`: aggregate counts over the archive.
pub async fn run_stats(config: &ArkivConfig) -> Result<(), ArkivError> {
    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    let stats = queries::messages::stats(&db).await?;
    db.close().await?;

    println!();
    println!("  arkiv stats ({})", config.storage.database_path);
    println!("  {}", "-".repeat(40));
    println!("    Messages: {}", stats.message_count);
    println!("    Chats:    {}", stats.chat_count);
    println!("    Users:    {}", stats.user_count);
    match (stats.earliest, stats.latest) {
        (Some(earliest), Some(latest)) => {
            println!("    Earliest: {}", earliest.format("%Y-%m-%d %H:%M:%S"));
            println!("    Latest:   {}", latest.format("%Y-%m-%d %H:%M:%S"));
        }
        _ => println!("    (archive is empty)"),
    }
    println!();
    Ok(())
}
