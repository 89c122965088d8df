use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::utils::file::{ensure_promotable, promote_part, try_delete};
use crate::utils::paths::part_path;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub promoted: Vec<PathBuf>,
    pub discarded: Vec<PathBuf>,
}

/// Promotes every finalized `.part` into place when the batch succeeded, otherwise
/// discards the `.part` files of `finalized` and `in_flight` and leaves installed
/// files untouched.
pub async fn commit_or_abort(
    finalized: &[PathBuf],
    in_flight: &[PathBuf],
    all_ok: bool,
) -> Result<CommitReport> {
    if all_ok {
        return commit(finalized).await;
    }

    let mut report = CommitReport::default();
    for destination in finalized.iter().chain(in_flight) {
        discard(destination).await;
        report.discarded.push(destination.clone());
    }
    tracing::error!(
        "[finalize] aborted; removed {} temp file(s), no changes applied",
        report.discarded.len()
    );
    Ok(report)
}

/// Renames each `.part` over its destination in order. Destinations a rename cannot
/// replace are rejected before anything is promoted. A failed promotion discards
/// the remaining `.part` files before the error is returned.
pub async fn commit(finalized: &[PathBuf]) -> Result<CommitReport> {
    for destination in finalized {
        if let Err(err) = ensure_promotable(destination).await {
            tracing::error!("[finalize] {}; nothing promoted", err);
            for rest in finalized {
                discard(rest).await;
            }
            return Err(err);
        }
    }

    let mut report = CommitReport::default();
    for (index, destination) in finalized.iter().enumerate() {
        if let Err(err) = promote_part(destination).await {
            tracing::error!(
                "[finalize] promotion of {} failed after {} file(s): {}",
                destination.display(),
                report.promoted.len(),
                err
            );
            for rest in &finalized[index..] {
                discard(rest).await;
            }
            return Err(err);
        }
        report.promoted.push(destination.clone());
    }
    if !report.promoted.is_empty() {
        tracing::info!("[finalize] installed all {} queued file(s)", report.promoted.len());
    }
    Ok(report)
}

async fn discard(destination: &Path) {
    try_delete(&part_path(destination)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UpdaterError;
    use crate::test_support::temp_root;

    fn stage(root: &Path, name: &str, old: Option<&[u8]>, new: Option<&[u8]>) -> PathBuf {
        let dest = root.join(name);
        if let Some(old) = old {
            std::fs::write(&dest, old).expect("write old");
        }
        if let Some(new) = new {
            std::fs::write(part_path(&dest), new).expect("write part");
        }
        dest
    }

    #[tokio::test]
    async fn successful_batch_promotes_everything() {
        let root = temp_root("install-ok");
        let a = stage(&root, "a.bin", Some(b"old a"), Some(b"new a"));
        let b = stage(&root, "b.bin", None, Some(b"new b"));

        let report = commit_or_abort(&[a.clone(), b.clone()], &[], true)
            .await
            .expect("commit");

        assert_eq!(report.promoted, vec![a.clone(), b.clone()]);
        assert_eq!(std::fs::read(&a).expect("a"), b"new a");
        assert_eq!(std::fs::read(&b).expect("b"), b"new b");
        assert!(!part_path(&a).exists() && !part_path(&b).exists());
    }

    #[tokio::test]
    async fn failed_batch_discards_parts_and_keeps_originals() {
        let root = temp_root("install-abort");
        let a = stage(&root, "a.bin", Some(b"old a"), Some(b"new a"));
        let b = stage(&root, "b.bin", None, Some(b"new b"));
        let c = stage(&root, "c.bin", Some(b"old c"), Some(b"partial"));

        let report = commit_or_abort(&[a.clone(), b.clone()], &[c.clone()], false)
            .await
            .expect("abort");

        assert!(report.promoted.is_empty());
        assert_eq!(report.discarded.len(), 3);
        assert_eq!(std::fs::read(&a).expect("a"), b"old a");
        assert!(!b.exists());
        assert_eq!(std::fs::read(&c).expect("c"), b"old c");
        for dest in [&a, &b, &c] {
            assert!(!part_path(dest).exists());
        }
    }

    #[tokio::test]
    async fn missing_part_stops_commit_and_cleans_the_rest() {
        let root = temp_root("install-missing");
        let a = stage(&root, "a.bin", Some(b"old a"), Some(b"new a"));
        let b = stage(&root, "b.bin", Some(b"old b"), None);
        let c = stage(&root, "c.bin", Some(b"old c"), Some(b"new c"));

        let err = commit(&[a.clone(), b.clone(), c.clone()])
            .await
            .expect_err("missing part");

        assert!(matches!(err, UpdaterError::MissingPart(_)));
        assert_eq!(std::fs::read(&a).expect("a"), b"new a");
        assert_eq!(std::fs::read(&b).expect("b"), b"old b");
        assert_eq!(std::fs::read(&c).expect("c"), b"old c");
        assert!(!part_path(&c).exists());
    }

    #[tokio::test]
    async fn directory_destination_aborts_before_any_promotion() {
        let root = temp_root("install-dir");
        let a = stage(&root, "a.bin", Some(b"old a"), Some(b"new a"));
        let dir = root.join("data.pak");
        std::fs::create_dir_all(dir.join("keep")).expect("mkdir");
        std::fs::write(part_path(&dir), b"new data").expect("write part");

        let err = commit_or_abort(&[a.clone(), dir.clone()], &[], true)
            .await
            .expect_err("directory in the way");

        assert!(matches!(err, UpdaterError::DestinationIsDirectory(_)));
        assert_eq!(std::fs::read(&a).expect("a"), b"old a");
        assert!(dir.join("keep").is_dir());
        assert!(!part_path(&a).exists());
        assert!(!part_path(&dir).exists());
    }

    #[tokio::test]
    async fn empty_successful_batch_is_a_no_op() {
        let report = commit_or_abort(&[], &[], true).await.expect("noop");
        assert_eq!(report, CommitReport::default());
    }
}
