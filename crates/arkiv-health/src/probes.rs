// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Disk and memory usage probes backed by sysinfo.
//!
//! Used both by the `/health` checks (disk < 90%, memory < 85%) and by the
//! orchestrator's startup pre-flight (refuse to start at >= 95% disk usage).

use std::path::Path;

use sysinfo::{Disks, System};

/// Usage percentage (0-100) of the disk holding `path`.
///
/// Picks the mounted disk with the longest mount-point prefix of `path`.
/// Returns `None` when no disk matches (e.g. exotic mounts in containers),
/// which callers treat as "cannot tell" rather than unhealthy.
pub fn disk_usage_pct(path: &Path) -> Option<f64> {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(usize, f64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if !path.starts_with(mount) {
            continue;
        }
        let total = disk.total_space();
        if total == 0 {
            continue;
        }
        let used = total.saturating_sub(disk.available_space());
        let pct = used as f64 / total as f64 * 100.0;
        let depth = mount.components().count();
        match best {
            Some((best_depth, _)) if best_depth >= depth => {}
            _ => best = Some((depth, pct)),
        }
    }
    best.map(|(_, pct)| pct)
}

/// System memory usage percentage (0-100).
pub fn memory_usage_pct() -> Option<f64> {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return None;
    }
    Some(sys.used_memory() as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_usage_for_root_is_sane() {
        // The root filesystem always exists; usage must be a percentage.
        if let Some(pct) = disk_usage_pct(Path::new("/")) {
            assert!((0.0..=100.0).contains(&pct), "pct out of range: {pct}");
        }
    }

    #[test]
    fn memory_usage_is_sane() {
        let pct = memory_usage_pct().expect("host reports memory");
        assert!((0.0..=100.0).contains(&pct), "pct out of range: {pct}");
    }
}
