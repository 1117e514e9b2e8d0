// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Arkiv archival engine.
//!
//! TOML files merged through the XDG hierarchy with `ARKIV_*` environment
//! overrides. Every field has a compiled default so the archiver starts
//! with no config file at all.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ArkivConfig;
