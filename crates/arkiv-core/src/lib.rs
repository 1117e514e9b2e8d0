// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Arkiv archival engine.
//!
//! Provides the error type and canonical message/domain types used by every
//! other crate in the workspace. Upstream adapters depend on this crate only.

pub mod error;
pub mod types;

pub use error::ArkivError;
pub use types::{ArchiveMessage, ArchiveStats, BackupInfo, RetentionOutcome};
