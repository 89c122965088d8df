use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::{Manifest, ManifestFile, QueuedFile};
use crate::services::hasher::{hashes_match, Hasher};
use crate::utils::file::{destination_conflict, file_len, FileManager};
use crate::utils::paths::is_part_file;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueReason {
    Missing,
    SizeMismatch,
    HashMismatch,
    HashError,
}

impl QueueReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueReason::Missing => "missing",
            QueueReason::SizeMismatch => "size_mismatch",
            QueueReason::HashMismatch => "hash_mismatch",
            QueueReason::HashError => "hash_error",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeepReason {
    /// Size agrees and the manifest has no hash to check against.
    SizeTrusted,
    HashMatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuickDecision {
    Queue(QueueReason),
    Keep,
    NeedsHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Queue(QueueReason),
    Keep(KeepReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanTotals {
    pub files: usize,
    /// Sum of the known sizes. Only a real total when `sizes_known_for_all`.
    pub bytes: u64,
    pub sizes_known_for_all: bool,
}

impl Default for PlanTotals {
    fn default() -> Self {
        Self {
            files: 0,
            bytes: 0,
            sizes_known_for_all: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct DownloadPlan {
    pub queue: Vec<QueuedFile>,
    pub totals: PlanTotals,
    pub skipped: Vec<SkippedEntry>,
}

impl DownloadPlan {
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, destination: &Path) -> bool {
        self.queue.iter().any(|item| item.destination == destination)
    }

    pub fn destinations(&self) -> Vec<PathBuf> {
        self.queue.iter().map(|item| item.destination.clone()).collect()
    }
}

pub fn compute_totals(queue: &[QueuedFile]) -> PlanTotals {
    let mut totals = PlanTotals::default();
    for item in queue {
        totals.files += 1;
        if item.entry.size > 0 {
            totals.bytes = totals.bytes.saturating_add(item.entry.size);
        } else {
            totals.sizes_known_for_all = false;
        }
    }
    totals
}

/// Stat-only triage. `NeedsHash` means the size agrees and a hash is available.
pub fn quick_decision(entry: &ManifestFile, destination: &Path) -> QuickDecision {
    let Some(local_len) = file_len(destination) else {
        return QuickDecision::Queue(QueueReason::Missing);
    };
    if entry.size > 0 && local_len != entry.size {
        return QuickDecision::Queue(QueueReason::SizeMismatch);
    }
    if !entry.has_hash() {
        return QuickDecision::Keep;
    }
    QuickDecision::NeedsHash
}

#[derive(Clone)]
pub struct Planner {
    files: FileManager,
    hasher: Hasher,
}

impl Planner {
    pub fn new(files: FileManager, hasher: Hasher) -> Self {
        Self { files, hasher }
    }

    pub async fn decide(&self, entry: &ManifestFile, destination: &Path) -> Decision {
        match quick_decision(entry, destination) {
            QuickDecision::Queue(reason) => Decision::Queue(reason),
            QuickDecision::Keep => Decision::Keep(KeepReason::SizeTrusted),
            QuickDecision::NeedsHash => {
                let expected = entry.sha256.as_deref().unwrap_or_default();
                match self.hasher.digest(destination).await {
                    None => Decision::Queue(QueueReason::HashError),
                    Some(local) if hashes_match(&local.hex, expected) => {
                        Decision::Keep(KeepReason::HashMatch)
                    }
                    Some(_) => Decision::Queue(QueueReason::HashMismatch),
                }
            }
        }
    }

    /// Walks the manifest in order and queues every entry whose local copy is stale.
    /// Bad entries are skipped without affecting the rest.
    pub async fn plan(&self, manifest: &Manifest) -> DownloadPlan {
        let mut plan = DownloadPlan::default();
        let mut seen = HashSet::new();

        for entry in &manifest.files {
            if entry.path.trim().is_empty() || entry.url.trim().is_empty() {
                tracing::error!("[plan] invalid manifest entry (path={:?}); skipping", entry.path);
                plan.skipped.push(SkippedEntry {
                    path: entry.path.clone(),
                    reason: "missing path or url".to_string(),
                });
                continue;
            }

            let destination = match self.files.resolve(&entry.path) {
                Ok(path) => path,
                Err(err) => {
                    tracing::error!("[plan] {}", err);
                    plan.skipped.push(SkippedEntry {
                        path: entry.path.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            if is_part_file(&destination) {
                tracing::error!("[plan] {} uses the temp suffix; skipping", entry.path);
                plan.skipped.push(SkippedEntry {
                    path: entry.path.clone(),
                    reason: "temp (.part) paths cannot be installed".to_string(),
                });
                continue;
            }

            if let Some(reason) = destination_conflict(self.files.install_root(), &destination) {
                tracing::error!("[plan] {}: {}; skipping", entry.path, reason);
                plan.skipped.push(SkippedEntry {
                    path: entry.path.clone(),
                    reason,
                });
                continue;
            }

            if !seen.insert(destination.clone()) {
                tracing::warn!("[plan] duplicate entry for {}; keeping the first", entry.path);
                continue;
            }

            match self.decide(entry, &destination).await {
                Decision::Queue(reason) => {
                    tracing::info!("[plan] queue ({}): {}", reason.as_str(), entry.path);
                    plan.queue.push(QueuedFile {
                        entry: entry.clone(),
                        destination,
                    });
                }
                Decision::Keep(KeepReason::SizeTrusted) => {
                    tracing::info!("[plan] keep (size ok, no sha256): {}", entry.path);
                }
                Decision::Keep(KeepReason::HashMatch) => {
                    tracing::info!("[plan] keep (hash match): {}", entry.path);
                }
            }
        }

        plan.totals = compute_totals(&plan.queue);
        if plan.is_empty() {
            tracing::info!("[plan] nothing to download");
        }
        plan
    }
}
