// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-recovery and idempotence guarantees.
//!
//! Simulated crashes leave WAL records on disk without flushed store rows;
//! a fresh archiver on the same paths must replay them exactly once.

mod common;

use arkiv_engine::{Archiver, WriteAheadLog};
use chrono::Duration;
use common::{base_ts, make_msg, test_config};
use tempfile::tempdir;

#[tokio::test]
async fn wal_records_recovered_exactly_once_after_crash() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    // Simulate a crashed process: messages reached the WAL, never the store.
    {
        let wal = WriteAheadLog::new(config.storage.wal_path());
        wal.init().await.unwrap();
        for i in 0..5 {
            wal.append(&make_msg(&format!("m{i}"), i, &format!("body {i}")))
                .await
                .unwrap();
        }
        wal.close().await;
    }

    let archiver = Archiver::init(config.clone()).await.unwrap();

    let rows = archiver
        .query_by_time_range(base_ts() - Duration::seconds(1), base_ts() + Duration::seconds(60), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 5, "all unflushed messages recovered");

    // Recovery cleared the WAL.
    let wal = WriteAheadLog::new(config.storage.wal_path());
    assert!(wal.read_uncommitted().await.unwrap().is_empty());

    archiver.close().await;

    // A second startup on the same paths must not duplicate anything.
    let archiver = Archiver::init(config).await.unwrap();
    let rows = archiver
        .query_by_time_range(base_ts() - Duration::seconds(1), base_ts() + Duration::seconds(60), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 5, "recovery is exactly-once across restarts");
    archiver.close().await;
}

#[tokio::test]
async fn replaying_an_already_flushed_message_is_idempotent() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    // Archive and flush m1 normally.
    {
        let archiver = Archiver::init(config.clone()).await.unwrap();
        archiver.archive(make_msg("m1", 0, "hello")).await.unwrap();
        assert!(archiver.flush_now().await.unwrap());
        archiver.close().await;
    }

    // Simulate a crash that happened after the flush committed but before
    // the WAL clear: the same message sits in the WAL again.
    {
        let wal = WriteAheadLog::new(config.storage.wal_path());
        wal.init().await.unwrap();
        wal.append(&make_msg("m1", 0, "hello")).await.unwrap();
        wal.close().await;
    }

    let archiver = Archiver::init(config).await.unwrap();
    let rows = archiver
        .query_by_time_range(base_ts() - Duration::seconds(1), base_ts() + Duration::seconds(1), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "upsert keyed by id keeps one row");
    assert_eq!(rows[0].content, "hello");
    archiver.close().await;
}

#[tokio::test]
async fn corrupt_wal_line_does_not_block_recovery() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    {
        let wal = WriteAheadLog::new(config.storage.wal_path());
        wal.init().await.unwrap();
        wal.append(&make_msg("m1", 0, "survives")).await.unwrap();
        wal.close().await;
    }
    // Torn trailing write from the crash.
    {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(config.storage.wal_path())
            .unwrap();
        f.write_all(b"{\"id\":\"m2\",\"times").unwrap();
    }

    let archiver = Archiver::init(config).await.unwrap();
    let rows = archiver
        .query_by_time_range(base_ts() - Duration::seconds(1), base_ts() + Duration::seconds(1), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "m1");
    archiver.close().await;
}
