use std::path::{Path, PathBuf};

use tokio::sync::watch;

use crate::config::UpdaterConfig;
use crate::errors::{Result, UpdaterError};
use crate::models::{Manifest, UpdaterState, UpdaterStatus};
use crate::services::downloader::Downloader;
use crate::services::hasher::Hasher;
use crate::services::installer::commit_or_abort;
use crate::services::manifest_service::ManifestService;
use crate::services::planner::{DownloadPlan, Planner};
use crate::services::progress::{format_bytes, FileProgress, ProgressModel};
use crate::services::storage;
use crate::utils::file::FileManager;

/// Drives fetch -> plan -> (caller trigger) -> download -> commit, one step at a time.
/// Every failure ends in a state, never in a half-written install root.
pub struct Updater {
    config: UpdaterConfig,
    files: FileManager,
    manifests: ManifestService,
    planner: Planner,
    downloader: Downloader,
    status: watch::Sender<UpdaterStatus>,
    state: UpdaterState,
    manifest: Option<Manifest>,
    plan: DownloadPlan,
    last_error: Option<String>,
}

impl Updater {
    pub fn new(config: UpdaterConfig, install_root: PathBuf) -> Self {
        let files = FileManager::new(install_root);
        let planner = Planner::new(files.clone(), Hasher::new(config.small_hash_max_bytes));
        let (status, _) = watch::channel(UpdaterStatus::default());
        Self {
            manifests: ManifestService::new(&config),
            downloader: Downloader::new(&config),
            config,
            files,
            planner,
            status,
            state: UpdaterState::Idle,
            manifest: None,
            plan: DownloadPlan::default(),
            last_error: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdaterStatus> {
        self.status.subscribe()
    }

    pub fn state(&self) -> UpdaterState {
        self.state
    }

    pub fn status(&self) -> UpdaterStatus {
        self.status.borrow().clone()
    }

    pub fn plan(&self) -> &DownloadPlan {
        &self.plan
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn install_root(&self) -> &Path {
        self.files.install_root()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn publish(&mut self, status: UpdaterStatus) {
        self.state = status.state;
        tracing::debug!(
            "[updater] {} | {} | {}",
            status.state.as_str(),
            status.headline,
            status.detail
        );
        self.status.send_replace(status);
    }

    /// Fetches the manifest and plans against the install root.
    pub async fn check_for_updates(&mut self) -> UpdaterState {
        self.last_error = None;
        self.plan = DownloadPlan::default();
        self.publish(UpdaterStatus::new(
            UpdaterState::FetchingManifest,
            "Fetching manifest...",
            "Connecting to server",
        ));

        self.manifest = match self.fetch_manifest().await {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                let (headline, detail) = describe_fetch_error(&err);
                tracing::error!("[manifest] {}", err);
                self.last_error = Some(err.to_string());
                self.publish(UpdaterStatus::new(UpdaterState::FetchingManifest, headline, detail));
                None
            }
        };

        let has_files = self
            .manifest
            .as_ref()
            .map(|manifest| !manifest.is_empty())
            .unwrap_or(false);
        if !has_files {
            tracing::error!("[updater] no manifest/files; allowing play with installed content");
            self.publish(UpdaterStatus::new(
                UpdaterState::ReadyToPlay,
                "No updates available",
                "Ready to play",
            ));
            return self.state;
        }

        self.replan().await
    }

    async fn fetch_manifest(&self) -> Result<Manifest> {
        let url = self.config.manifest_url()?;
        self.manifests.fetch(url).await
    }

    /// Re-runs planning against the manifest already held.
    pub async fn replan(&mut self) -> UpdaterState {
        let Some(manifest) = self.manifest.clone() else {
            return self.state;
        };
        self.publish(UpdaterStatus::new(
            UpdaterState::Planning,
            "Checking files...",
            "Verifying local files",
        ));

        self.plan = self.planner.plan(&manifest).await;

        if self.plan.is_empty() {
            tracing::info!("[updater] everything up to date");
            self.publish(
                UpdaterStatus::new(UpdaterState::ReadyToPlay, "All files up to date", "Ready to play")
                    .with_progress(1.0),
            );
        } else {
            let totals = &self.plan.totals;
            let size = if totals.sizes_known_for_all {
                format_bytes(totals.bytes)
            } else {
                format!("at least {}", format_bytes(totals.bytes))
            };
            let detail = format!("{} files to download ({})", totals.files, size);
            self.publish(UpdaterStatus::new(
                UpdaterState::ReadyToUpdate,
                "Updates available",
                detail,
            ));
        }
        self.state
    }

    /// Downloads the queued batch sequentially and commits it all-or-nothing.
    /// Only acts from `ReadyToUpdate`; any other state is returned unchanged.
    pub async fn install_queued(&mut self) -> UpdaterState {
        if self.state != UpdaterState::ReadyToUpdate {
            tracing::warn!(
                "[updater] install requested in state {}; ignoring",
                self.state.as_str()
            );
            return self.state;
        }
        if self.plan.is_empty() {
            self.publish(
                UpdaterStatus::new(UpdaterState::ReadyToPlay, "All files up to date", "Ready to play")
                    .with_progress(1.0),
            );
            return self.state;
        }

        self.last_error = None;
        self.publish(UpdaterStatus::new(
            UpdaterState::Installing,
            "Preparing update",
            format!("{} files queued", self.plan.totals.files),
        ));

        if let Err(err) = storage::preflight(
            self.files.install_root(),
            &self.plan.totals,
            self.config.storage_safety_floor_bytes,
        ) {
            return self.fail_and_replan(err).await;
        }

        let queue = self.plan.queue.clone();
        let mut model = ProgressModel::new(self.plan.totals.clone());
        let mut finalized: Vec<PathBuf> = Vec::with_capacity(queue.len());
        let mut in_flight: Vec<PathBuf> = Vec::new();
        let mut failure: Option<UpdaterError> = None;

        for item in &queue {
            let mut current = FileProgress::new(item.entry.file_name(), item.entry.size);
            self.publish(
                UpdaterStatus::new(
                    UpdaterState::Installing,
                    format!("Downloading: {}", current.name),
                    current.detail(),
                )
                .with_progress(model.fraction(item.entry.size, 0)),
            );

            let status = &self.status;
            let model_ref = &model;
            let result = self
                .downloader
                .download_one(item, |bytes| {
                    current.downloaded = bytes;
                    status.send_replace(
                        UpdaterStatus::new(
                            UpdaterState::Installing,
                            format!("Downloading: {}", current.name),
                            current.detail(),
                        )
                        .with_progress(model_ref.fraction(item.entry.size, bytes)),
                    );
                })
                .await;

            match result {
                Ok(_) => {
                    model.complete_file(item.entry.size);
                    finalized.push(item.destination.clone());
                }
                Err(err) => {
                    in_flight.push(item.destination.clone());
                    failure = Some(err);
                    break;
                }
            }
        }

        let all_ok = failure.is_none();
        let committed = commit_or_abort(&finalized, &in_flight, all_ok).await;

        match (failure, committed) {
            (None, Ok(report)) => {
                tracing::info!("[updater] installed {} file(s)", report.promoted.len());
                self.plan = DownloadPlan::default();
                self.publish(
                    UpdaterStatus::new(
                        UpdaterState::Complete,
                        "Download complete",
                        "All files updated successfully",
                    )
                    .with_progress(1.0),
                );
                self.publish(
                    UpdaterStatus::new(
                        UpdaterState::ReadyToPlay,
                        "Download complete",
                        "All files updated successfully",
                    )
                    .with_progress(1.0),
                );
                self.state
            }
            (Some(err), _) | (None, Err(err)) => self.fail_and_replan(err).await,
        }
    }

    async fn fail_and_replan(&mut self, err: UpdaterError) -> UpdaterState {
        tracing::error!("[updater] install failed: {}", err);
        let progress = self.status.borrow().progress;
        self.last_error = Some(err.to_string());
        self.publish(
            UpdaterStatus::new(UpdaterState::Failed, "Download failed", err.to_string())
                .with_progress(progress),
        );

        self.replan().await;
        let last_error = self.last_error.clone().unwrap_or_default();
        if self.state == UpdaterState::ReadyToUpdate {
            self.publish(
                UpdaterStatus::new(
                    UpdaterState::ReadyToUpdate,
                    "Download failed",
                    format!("Click Update to retry ({last_error})"),
                )
                .with_progress(progress),
            );
        }
        self.state
    }
}

fn describe_fetch_error(err: &UpdaterError) -> (&'static str, &'static str) {
    match err {
        UpdaterError::EmptyManifest => ("Server error", "Empty response from server"),
        UpdaterError::Serde(_) => ("Data error", "Invalid update information format"),
        UpdaterError::Config(_) => ("Configuration error", "No update source configured"),
        _ => ("Network error", "Failed to fetch update information"),
    }
}
