use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ManifestFile {
    /// Relative to the install root.
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    /// Expected bytes, 0 when unknown.
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default)]
    pub sha256: Option<String>,
}

impl ManifestFile {
    pub fn has_hash(&self) -> bool {
        self.sha256
            .as_deref()
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(|ch: char| ch == '/' || ch == '\\')
            .next()
            .unwrap_or(self.path.as_str())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "skip_null_entries")]
    pub files: Vec<ManifestFile>,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default)]
    pub published_at: String,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// `null` reads as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn skip_null_entries<'de, D>(deserializer: D) -> std::result::Result<Vec<ManifestFile>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<ManifestFile>>>::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}

/// A manifest entry paired with its confined absolute destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedFile {
    pub entry: ManifestFile,
    pub destination: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterState {
    Idle,
    FetchingManifest,
    Planning,
    ReadyToPlay,
    ReadyToUpdate,
    Installing,
    Complete,
    Failed,
}

impl UpdaterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdaterState::Idle => "idle",
            UpdaterState::FetchingManifest => "fetching_manifest",
            UpdaterState::Planning => "planning",
            UpdaterState::ReadyToPlay => "ready_to_play",
            UpdaterState::ReadyToUpdate => "ready_to_update",
            UpdaterState::Installing => "installing",
            UpdaterState::Complete => "complete",
            UpdaterState::Failed => "failed",
        }
    }
}

/// Snapshot published to whatever UI is watching the updater.
#[derive(Clone, Debug, Serialize)]
pub struct UpdaterStatus {
    pub state: UpdaterState,
    pub headline: String,
    pub detail: String,
    /// 0.0..=1.0
    pub progress: f32,
}

impl UpdaterStatus {
    pub fn new(state: UpdaterState, headline: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            state,
            headline: headline.into(),
            detail: detail.into(),
            progress: 0.0,
        }
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = progress.clamp(0.0, 1.0);
        self
    }
}

impl Default for UpdaterStatus {
    fn default() -> Self {
        Self::new(UpdaterState::Idle, "Ready", "Waiting to start...")
    }
}
