// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and query operations.
//!
//! All SQL is parameterized; message content is never concatenated into a
//! statement. Timestamps are compared as fixed-width UTC ISO-8601 strings,
//! so lexicographic comparison in SQL matches chronological order.

use arkiv_core::{ArchiveMessage, ArchiveStats, ArkivError};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

const SELECT_COLUMNS: &str = "id, timestamp, channel, chat_id, chat_name, \
     user_id, user_name, content, is_mentioned, reply_to, metadata";

/// Render a timestamp in the store's fixed comparison format.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchiveMessage> {
    let raw_ts: String = row.get(1)?;
    let raw_meta: Option<String> = row.get(10)?;
    let metadata = match raw_meta {
        Some(m) => Some(serde_json::from_str(&m).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(ArchiveMessage {
        id: row.get(0)?,
        timestamp: parse_ts(1, &raw_ts)?,
        channel: row.get(2)?,
        chat_id: row.get(3)?,
        chat_name: row.get(4)?,
        user_id: row.get(5)?,
        user_name: row.get(6)?,
        content: row.get(7)?,
        is_mentioned: row.get(8)?,
        reply_to: row.get(9)?,
        metadata,
    })
}

/// Insert-or-replace a batch of messages in one transaction.
///
/// Keyed by message id, so re-inserting an already-archived message (live
/// redelivery or WAL replay after a crash) overwrites instead of
/// duplicating. Returns the number of messages written.
pub async fn insert_batch(db: &Database, messages: &[ArchiveMessage]) -> Result<usize, ArkivError> {
    if messages.is_empty() {
        return Ok(0);
    }
    let messages = messages.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for msg in &messages {
                let metadata = msg
                    .metadata
                    .as_ref()
                    .map(|m| serde_json::Value::Object(m.clone()).to_string());
                tx.execute(
                    "INSERT OR REPLACE INTO messages \
                     (id, timestamp, channel, chat_id, chat_name, user_id, \
                      user_name, content, is_mentioned, reply_to, metadata) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        msg.id,
                        fmt_ts(&msg.timestamp),
                        msg.channel,
                        msg.chat_id,
                        msg.chat_name,
                        msg.user_id,
                        msg.user_name,
                        msg.content,
                        msg.is_mentioned,
                        msg.reply_to,
                        metadata,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(messages.len())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch messages within an inclusive time range, optionally scoped to one
/// chat, ordered most-recent-first.
pub async fn query_by_time_range(
    db: &Database,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chat_id: Option<&str>,
) -> Result<Vec<ArchiveMessage>, ArkivError> {
    let start = fmt_ts(&start);
    let end = fmt_ts(&end);
    let chat_id = chat_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match chat_id {
                Some(chat) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM messages \
                         WHERE timestamp >= ?1 AND timestamp <= ?2 AND chat_id = ?3 \
                         ORDER BY timestamp DESC, rowid DESC"
                    ))?;
                    let rows = stmt.query_map(params![start, end, chat], map_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SELECT_COLUMNS} FROM messages \
                         WHERE timestamp >= ?1 AND timestamp <= ?2 \
                         ORDER BY timestamp DESC, rowid DESC"
                    ))?;
                    let rows = stmt.query_map(params![start, end], map_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Case-insensitive substring search over message content, most recent
/// first, capped by `limit`.
///
/// The keyword is passed as a bound parameter with LIKE wildcards escaped,
/// so user-supplied text cannot alter the match pattern.
pub async fn search_content(
    db: &Database,
    keyword: &str,
    limit: usize,
) -> Result<Vec<ArchiveMessage>, ArkivError> {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{escaped}%");
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM messages \
                 WHERE content LIKE ?1 ESCAPE '\\' \
                 ORDER BY timestamp DESC, rowid DESC \
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![pattern, limit], map_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Aggregate counts and timestamp bounds over the whole archive.
pub async fn stats(db: &Database) -> Result<ArchiveStats, ArkivError> {
    db.connection()
        .call(|conn| {
            let (message_count, chat_count, user_count, earliest, latest): (
                i64,
                i64,
                i64,
                Option<String>,
                Option<String>,
            ) = conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT chat_id), COUNT(DISTINCT user_id), \
                        MIN(timestamp), MAX(timestamp) \
                 FROM messages",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )?;
            let earliest = earliest.as_deref().map(|s| parse_ts(3, s)).transpose()?;
            let latest = latest.as_deref().map(|s| parse_ts(4, s)).transpose()?;
            Ok(ArchiveStats {
                message_count: message_count as u64,
                chat_count: chat_count as u64,
                user_count: user_count as u64,
                earliest,
                latest,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Delete rows strictly older than `cutoff`. Returns the number removed.
pub async fn delete_older_than(db: &Database, cutoff: DateTime<Utc>) -> Result<u64, ArkivError> {
    let cutoff = fmt_ts(&cutoff);
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE timestamp < ?1", [cutoff])?;
            Ok(deleted as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch rows strictly older than `cutoff` in chronological order, for
/// cold-archive export ahead of deletion.
pub async fn select_older_than(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ArchiveMessage>, ArkivError> {
    let cutoff = fmt_ts(&cutoff);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM messages \
                 WHERE timestamp < ?1 \
                 ORDER BY timestamp ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map([cutoff], map_row)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).await.unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, ts: DateTime<Utc>, chat: &str, content: &str) -> ArchiveMessage {
        ArchiveMessage {
            id: id.to_string(),
            timestamp: ts,
            channel: "test".to_string(),
            chat_id: chat.to_string(),
            chat_name: None,
            user_id: "u1".to_string(),
            user_name: "alice".to_string(),
            content: content.to_string(),
            is_mentioned: false,
            reply_to: None,
            metadata: None,
        }
    }

    fn base_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn insert_batch_and_query_range() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        let batch = vec![
            make_msg("m1", t0, "c1", "first"),
            make_msg("m2", t0 + Duration::seconds(1), "c1", "second"),
            make_msg("m3", t0 + Duration::seconds(2), "c2", "third"),
        ];
        assert_eq!(insert_batch(&db, &batch).await.unwrap(), 3);

        let all = query_by_time_range(&db, t0, t0 + Duration::seconds(10), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        // Most recent first.
        assert_eq!(all[0].id, "m3");
        assert_eq!(all[2].id, "m1");

        let scoped = query_by_time_range(&db, t0, t0 + Duration::seconds(10), Some("c1"))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|m| m.chat_id == "c1"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn range_bounds_are_inclusive() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();
        insert_batch(&db, &[make_msg("m1", t0, "c1", "edge")])
            .await
            .unwrap();

        let hit = query_by_time_range(&db, t0, t0, None).await.unwrap();
        assert_eq!(hit.len(), 1);

        let miss = query_by_time_range(
            &db,
            t0 + Duration::seconds(1),
            t0 + Duration::seconds(2),
            None,
        )
        .await
        .unwrap();
        assert!(miss.is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reinsert_same_id_overwrites() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        insert_batch(&db, &[make_msg("m1", t0, "c1", "original")])
            .await
            .unwrap();
        insert_batch(&db, &[make_msg("m1", t0, "c1", "edited")])
            .await
            .unwrap();

        let rows = query_by_time_range(&db, t0, t0, None).await.unwrap();
        assert_eq!(rows.len(), 1, "upsert must not duplicate");
        assert_eq!(rows[0].content, "edited");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_capped() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        let batch: Vec<_> = (0..5)
            .map(|i| {
                make_msg(
                    &format!("m{i}"),
                    t0 + Duration::seconds(i),
                    "c1",
                    &format!("Deploy finished #{i}"),
                )
            })
            .collect();
        insert_batch(&db, &batch).await.unwrap();

        let hits = search_content(&db, "deploy", 100).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].id, "m4", "most recent first");

        let capped = search_content(&db, "DEPLOY", 2).await.unwrap();
        assert_eq!(capped.len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn search_escapes_like_wildcards() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();
        insert_batch(
            &db,
            &[
                make_msg("m1", t0, "c1", "progress: 100% done"),
                make_msg("m2", t0, "c1", "unrelated"),
            ],
        )
        .await
        .unwrap();

        let hits = search_content(&db, "100%", 100).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "m1");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stats_counts_and_bounds() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        let empty = stats(&db).await.unwrap();
        assert_eq!(empty.message_count, 0);
        assert!(empty.earliest.is_none());

        let mut batch = vec![
            make_msg("m1", t0, "c1", "a"),
            make_msg("m2", t0 + Duration::seconds(5), "c2", "b"),
        ];
        batch[1].user_id = "u2".to_string();
        insert_batch(&db, &batch).await.unwrap();

        let s = stats(&db).await.unwrap();
        assert_eq!(s.message_count, 2);
        assert_eq!(s.chat_count, 2);
        assert_eq!(s.user_count, 2);
        assert_eq!(s.earliest, Some(t0));
        assert_eq!(s.latest, Some(t0 + Duration::seconds(5)));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_older_than_is_strict() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        insert_batch(
            &db,
            &[
                make_msg("old", t0 - Duration::days(40), "c1", "old"),
                make_msg("fresh", t0 - Duration::days(10), "c1", "fresh"),
                make_msg("edge", t0, "c1", "at cutoff"),
            ],
        )
        .await
        .unwrap();

        let deleted = delete_older_than(&db, t0 - Duration::days(30)).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = query_by_time_range(&db, t0 - Duration::days(365), t0, None)
            .await
            .unwrap();
        let ids: Vec<_> = remaining.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["edge", "fresh"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn select_older_than_returns_chronological() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        insert_batch(
            &db,
            &[
                make_msg("b", t0 - Duration::days(2), "c1", "second"),
                make_msg("a", t0 - Duration::days(3), "c1", "first"),
                make_msg("keep", t0, "c1", "recent"),
            ],
        )
        .await
        .unwrap();

        let old = select_older_than(&db, t0 - Duration::days(1)).await.unwrap();
        let ids: Vec<_> = old.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn metadata_round_trips_through_store() {
        let (db, _dir) = setup_db().await;
        let t0 = base_ts();

        let mut msg = make_msg("m1", t0, "c1", "with meta");
        let mut meta = serde_json::Map::new();
        meta.insert("sticker".into(), serde_json::Value::String("wave".into()));
        msg.metadata = Some(meta.clone());
        msg.reply_to = Some("m0".into());
        msg.is_mentioned = true;

        insert_batch(&db, &[msg]).await.unwrap();

        let rows = query_by_time_range(&db, t0, t0, None).await.unwrap();
        assert_eq!(rows[0].metadata, Some(meta));
        assert_eq!(rows[0].reply_to.as_deref(), Some("m0"));
        assert!(rows[0].is_mentioned);

        db.close().await.unwrap();
    }
}
