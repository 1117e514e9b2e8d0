// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical types shared across the Arkiv workspace.
//!
//! Source-specific adapters convert their native payloads into
//! [`ArchiveMessage`] before handing them to the archiver; everything
//! downstream (WAL, buffer, store, backups) speaks this shape only.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message in canonical form.
///
/// `id` is globally unique and acts as the upsert key: archiving the same
/// id twice overwrites the stored row instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMessage {
    /// Globally unique message identifier.
    pub id: String,
    /// Message timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Tag of the originating integration ("telegram", "discord", ...).
    pub channel: String,
    /// Chat or conversation identifier within the channel.
    pub chat_id: String,
    /// Optional human-readable chat name.
    #[serde(default)]
    pub chat_name: Option<String>,
    /// Sender identifier.
    pub user_id: String,
    /// Sender display name.
    pub user_name: String,
    /// Message text content.
    pub content: String,
    /// Whether the archiving account was mentioned.
    #[serde(default)]
    pub is_mentioned: bool,
    /// Identifier of the message this one replies to, if any.
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Opaque source-specific metadata, stored verbatim.
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ArchiveMessage {
    /// Timestamp rendered in the fixed store format: UTC ISO-8601 with
    /// millisecond precision. Lexicographic order equals chronological
    /// order, which the store's range queries rely on.
    pub fn timestamp_str(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Aggregate statistics over the archived messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStats {
    /// Total archived messages.
    pub message_count: u64,
    /// Distinct chat identifiers.
    pub chat_count: u64,
    /// Distinct user identifiers.
    pub user_count: u64,
    /// Earliest message timestamp, if any messages exist.
    pub earliest: Option<DateTime<Utc>>,
    /// Latest message timestamp, if any messages exist.
    pub latest: Option<DateTime<Utc>>,
}

/// Outcome of one retention-cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionOutcome {
    /// Rows deleted from the store.
    pub deleted: u64,
    /// Rows exported to cold-archive files before deletion.
    pub archived: u64,
}

/// Metadata about one backup artifact.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    /// Artifact file name (`backup_<timestamp>`).
    pub name: String,
    /// Absolute path of the artifact.
    pub path: std::path::PathBuf,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// Artifact modification time.
    pub modified: DateTime<Utc>,
}
