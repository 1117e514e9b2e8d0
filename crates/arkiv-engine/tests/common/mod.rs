// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for the engine integration tests.

use std::path::Path;

use arkiv_config::ArkivConfig;
use arkiv_core::ArchiveMessage;
use chrono::{DateTime, TimeZone, Utc};

/// Config pointed at a scratch directory: ephemeral health port, timers
/// effectively off, schedules disabled unless a test turns them on.
pub fn test_config(dir: &Path) -> ArkivConfig {
    let mut config = ArkivConfig::default();
    config.storage.database_path = dir.join("archive.db").to_string_lossy().into_owned();
    config.writer.buffer_size = 100;
    config.writer.flush_interval_secs = 3600;
    config.backup.enabled = false;
    config.backup.dir = Some(dir.join("backups").to_string_lossy().into_owned());
    config.cleanup.enabled = false;
    config.health.host = "127.0.0.1".to_string();
    config.health.port = 0;
    config
}

pub fn base_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn make_msg(id: &str, offset_secs: i64, content: &str) -> ArchiveMessage {
    ArchiveMessage {
        id: id.to_string(),
        timestamp: base_ts() + chrono::Duration::seconds(offset_secs),
        channel: "test".to_string(),
        chat_id: "c1".to_string(),
        chat_name: None,
        user_id: "u1".to_string(),
        user_name: "alice".to_string(),
        content: content.to_string(),
        is_mentioned: false,
        reply_to: None,
        metadata: None,
    }
}
