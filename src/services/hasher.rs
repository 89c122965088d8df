use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::errors::{Result, UpdaterError};

const READ_BUFFER_BYTES: usize = 512 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashStrategy {
    /// Hash on the calling task.
    Inline,
    /// Hash on the blocking pool while the caller awaits.
    Worker,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub hex: String,
    pub strategy: HashStrategy,
}

#[derive(Clone, Copy, Debug)]
pub struct Hasher {
    small_max_bytes: u64,
}

impl Hasher {
    pub fn new(small_max_bytes: u64) -> Self {
        Self { small_max_bytes }
    }

    pub fn strategy_for(&self, len: u64) -> HashStrategy {
        if len <= self.small_max_bytes {
            HashStrategy::Inline
        } else {
            HashStrategy::Worker
        }
    }

    /// Lowercase hex SHA-256 of `path`, or `None` if it cannot be read.
    pub async fn digest(&self, path: &Path) -> Option<FileDigest> {
        let len = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(err) => {
                tracing::debug!("[hash] cannot stat {}: {}", path.display(), err);
                return None;
            }
        };
        let strategy = self.strategy_for(len);
        match hash_with(path, strategy).await {
            Ok(hex) => Some(FileDigest { hex, strategy }),
            Err(err) => {
                tracing::warn!("[hash] {} failed: {}", path.display(), err);
                None
            }
        }
    }
}

pub async fn hash_with(path: &Path, strategy: HashStrategy) -> Result<String> {
    match strategy {
        HashStrategy::Inline => sha256_file(path),
        HashStrategy::Worker => {
            let owned: PathBuf = path.to_path_buf();
            tokio::task::spawn_blocking(move || sha256_file(&owned))
                .await
                .map_err(|err| UpdaterError::Worker(format!("hash worker join error: {err}")))?
        }
    }
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; READ_BUFFER_BYTES];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

pub fn hashes_match(local: &str, expected: &str) -> bool {
    normalize_hash(local) == normalize_hash(expected)
}
