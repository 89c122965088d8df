use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{Result, UpdaterError};
use crate::utils::paths::{part_path, resolve_under_root};

#[derive(Clone, Debug)]
pub struct FileManager {
    install_root: PathBuf,
}

impl FileManager {
    pub fn new(install_root: PathBuf) -> Self {
        Self { install_root }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        resolve_under_root(&self.install_root, relative)
    }
}

/// Length of a regular file, `None` when it is absent or not a file.
pub fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

pub async fn try_delete(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("[cleanup] removed {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!("[cleanup] cannot delete {}: {}", path.display(), err),
    }
}

/// Why a file cannot be written at `destination`: a directory sits there, or a
/// regular file sits where one of its parent directories should be.
pub fn destination_conflict(install_root: &Path, destination: &Path) -> Option<String> {
    if destination.is_dir() {
        return Some("a directory occupies the destination".to_string());
    }
    let mut ancestor = destination.parent();
    while let Some(dir) = ancestor {
        if dir == install_root || !dir.starts_with(install_root) {
            break;
        }
        if dir.is_file() {
            return Some(format!("{} is a file, not a directory", dir.display()));
        }
        ancestor = dir.parent();
    }
    None
}

/// Fails when `destination` exists as a directory; rename cannot replace it.
pub async fn ensure_promotable(destination: &Path) -> Result<()> {
    match tokio::fs::metadata(destination).await {
        Ok(meta) if meta.is_dir() => Err(UpdaterError::DestinationIsDirectory(
            destination.to_path_buf(),
        )),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Replaces `destination` with its `.part` sibling via rename.
pub async fn promote_part(destination: &Path) -> Result<()> {
    let temp = part_path(destination);
    if !tokio::fs::try_exists(&temp).await.unwrap_or(false) {
        return Err(UpdaterError::MissingPart(temp));
    }
    ensure_promotable(destination).await?;

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(destination).await.unwrap_or(false) {
        tokio::fs::remove_file(destination).await?;
    }
    tokio::fs::rename(&temp, destination).await?;
    tracing::info!("[finalize] installed {}", destination.display());
    Ok(())
}
