// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durability engine for the Arkiv message archiver.
//!
//! Data path: an upstream adapter hands a canonical message to the
//! [`Archiver`], which appends it to the [`wal::WriteAheadLog`] (durable
//! enqueue), buffers it in the [`writer::ArchiveWriter`], and later upserts
//! it into the store as part of exactly one flush batch, after which the
//! corresponding WAL records are released. Backup and cleanup schedules and
//! the health listener run alongside on their own timers.

pub mod backup;
pub mod cleanup;
pub mod orchestrator;
pub mod shutdown;
pub mod wal;
pub mod writer;

pub use backup::BackupManager;
pub use cleanup::CleanupManager;
pub use orchestrator::Archiver;
pub use wal::WriteAheadLog;
pub use writer::ArchiveWriter;
