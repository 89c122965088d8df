pub mod downloader;
pub mod hasher;
pub mod installer;
pub mod manifest_service;
pub mod planner;
pub mod progress;
pub mod storage;
pub mod updater;

pub use downloader::{Downloader, StallWatchdog, WatchdogVerdict};
pub use hasher::{FileDigest, HashStrategy, Hasher};
pub use installer::{commit, commit_or_abort, CommitReport};
pub use manifest_service::ManifestService;
pub use planner::{Decision, DownloadPlan, PlanTotals, Planner, QueueReason};
pub use progress::{FileProgress, ProgressModel};
pub use updater::Updater;
