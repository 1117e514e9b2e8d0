// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counters and gauges exposed through `GET /metrics`.
//!
//! All counters are lock-free atomics so recording from the hot archive
//! path never blocks. Query latencies keep a bounded rolling window of the
//! most recent samples.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Number of query latency samples retained for the rolling summary.
const LATENCY_WINDOW: usize = 100;

/// Live counters for the archival engine.
#[derive(Debug, Default)]
pub struct ArchiveMetrics {
    messages_archived: AtomicU64,
    flushes_succeeded: AtomicU64,
    flushes_failed: AtomicU64,
    backups_completed: AtomicU64,
    queries_served: AtomicU64,
    query_latency_ms: Mutex<VecDeque<u64>>,
}

impl ArchiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted message.
    pub fn record_message(&self) {
        self.messages_archived.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one flush attempt by outcome.
    pub fn record_flush(&self, success: bool) {
        if success {
            self.flushes_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.flushes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one completed backup.
    pub fn record_backup(&self) {
        self.backups_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one served query and record its latency into the rolling window.
    pub fn record_query(&self, latency_ms: u64) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
        let mut window = self.query_latency_ms.lock().unwrap_or_else(|e| e.into_inner());
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(latency_ms);
    }

    /// Point-in-time copy of all counters, for serialization.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let window = self.query_latency_ms.lock().unwrap_or_else(|e| e.into_inner());
        let samples = window.len() as u64;
        let avg_ms = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<u64>() as f64 / window.len() as f64
        };
        let max_ms = window.iter().copied().max().unwrap_or(0);
        MetricsSnapshot {
            messages_archived: self.messages_archived.load(Ordering::Relaxed),
            flushes_succeeded: self.flushes_succeeded.load(Ordering::Relaxed),
            flushes_failed: self.flushes_failed.load(Ordering::Relaxed),
            backups_completed: self.backups_completed.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            query_latency: LatencySummary {
                samples,
                avg_ms,
                max_ms,
            },
        }
    }
}

/// Serialized form of [`ArchiveMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub messages_archived: u64,
    pub flushes_succeeded: u64,
    pub flushes_failed: u64,
    pub backups_completed: u64,
    pub queries_served: u64,
    pub query_latency: LatencySummary,
}

/// Rolling-window latency summary over the most recent queries.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    /// Samples currently in the window (at most 100).
    pub samples: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = ArchiveMetrics::new();
        metrics.record_message();
        metrics.record_message();
        metrics.record_flush(true);
        metrics.record_flush(false);
        metrics.record_backup();

        let snap = metrics.snapshot();
        assert_eq!(snap.messages_archived, 2);
        assert_eq!(snap.flushes_succeeded, 1);
        assert_eq!(snap.flushes_failed, 1);
        assert_eq!(snap.backups_completed, 1);
    }

    #[test]
    fn latency_window_is_bounded_to_100() {
        let metrics = ArchiveMetrics::new();
        for i in 0..250 {
            metrics.record_query(i);
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.queries_served, 250);
        assert_eq!(snap.query_latency.samples, 100);
        // Only the most recent 100 samples (150..=249) remain.
        assert_eq!(snap.query_latency.max_ms, 249);
        assert!(snap.query_latency.avg_ms >= 150.0);
    }

    #[test]
    fn empty_window_summarizes_to_zero() {
        let snap = ArchiveMetrics::new().snapshot();
        assert_eq!(snap.query_latency.samples, 0);
        assert_eq!(snap.query_latency.avg_ms, 0.0);
        assert_eq!(snap.query_latency.max_ms, 0);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let metrics = ArchiveMetrics::new();
        metrics.record_query(12);
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"queries_served\":1"));
        assert!(json.contains("\"max_ms\":12"));
    }
}
