use std::path::{Path, PathBuf};

use sysinfo::Disks;

use crate::errors::{Result, UpdaterError};
use crate::services::planner::PlanTotals;

fn nearest_existing_path(path: &Path) -> PathBuf {
    let mut candidate = path.to_path_buf();
    while !candidate.exists() {
        if !candidate.pop() {
            return PathBuf::from(".");
        }
    }
    candidate
}

/// Free bytes on the disk whose mount point is the longest prefix of `path`.
pub fn available_disk_space(path: &Path) -> Option<u64> {
    let target = nearest_existing_path(path);
    let target = std::fs::canonicalize(&target).unwrap_or(target);
    let disks = Disks::new_with_refreshed_list();

    let mut best: Option<(usize, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if target.starts_with(mount) {
            let score = mount.as_os_str().len();
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, disk.available_space())),
            }
        }
    }
    best.map(|(_, available)| available)
}

pub fn evaluate_storage(available: u64, planned_bytes: u64, safety_floor: u64) -> Result<()> {
    let required = planned_bytes.saturating_add(safety_floor);
    if available < required {
        return Err(UpdaterError::InsufficientStorage {
            required,
            available,
        });
    }
    Ok(())
}

/// Only enforced when every queued size is known; unknown free space is a warning.
pub fn preflight(install_root: &Path, totals: &PlanTotals, safety_floor: u64) -> Result<()> {
    if !totals.sizes_known_for_all || totals.bytes == 0 {
        return Ok(());
    }
    match available_disk_space(install_root) {
        Some(available) => {
            tracing::debug!(
                "[storage] available={} planned={} floor={}",
                available,
                totals.bytes,
                safety_floor
            );
            evaluate_storage(available, totals.bytes, safety_floor)
        }
        None => {
            tracing::warn!(
                "[storage] cannot determine free space for {}; continuing",
                install_root.display()
            );
            Ok(())
        }
    }
}
