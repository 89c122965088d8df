use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::errors::{Result, UpdaterError};

pub const PART_SUFFIX: &str = ".part";

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if std::fs::create_dir_all(path).is_ok() {
        return Some(path.to_path_buf());
    }
    None
}

fn absolutize(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path)
        .or_else(|_| std::path::absolute(&path))
        .unwrap_or(path)
}

/// Install root: `OTOSHI_UPDATER_ROOT`, then the executable's directory, then the
/// platform data directory.
pub fn resolve_install_root() -> PathBuf {
    if let Ok(value) = std::env::var("OTOSHI_UPDATER_ROOT") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            if let Some(dir) = ensure_dir(Path::new(trimmed)) {
                return absolutize(dir);
            }
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            return absolutize(dir.to_path_buf());
        }
    }

    if let Some(data) = dirs::data_dir() {
        if let Some(dir) = ensure_dir(&data.join("otoshi-updater")) {
            return absolutize(dir);
        }
    }

    absolutize(PathBuf::from("."))
}

/// Joins `relative` onto `root` without ever leaving it. Backslashes count as
/// separators; absolute paths, drive prefixes, escaping `..` and paths that collapse
/// to the root itself are rejected.
pub fn resolve_under_root(root: &Path, relative: &str) -> Result<PathBuf> {
    let unsafe_path = || UpdaterError::UnsafePath(relative.to_string());
    let normalized = relative.replace('\\', "/");
    if normalized.trim().is_empty() {
        return Err(unsafe_path());
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(unsafe_path());
                }
            }
            Component::Prefix(_) | Component::RootDir => return Err(unsafe_path()),
        }
    }
    if parts.is_empty() {
        return Err(unsafe_path());
    }
    // "C:" style drive prefixes only parse as Prefix on Windows.
    if parts[0].to_string_lossy().contains(':') {
        return Err(unsafe_path());
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

pub fn part_path(destination: &Path) -> PathBuf {
    let mut raw: OsString = destination.as_os_str().to_owned();
    raw.push(PART_SUFFIX);
    PathBuf::from(raw)
}

pub fn is_part_file(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().ends_with(PART_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/game")
    }

    #[test]
    fn joins_plain_relative_paths() {
        let resolved = resolve_under_root(&root(), "Data/level0").expect("resolve");
        assert_eq!(resolved, PathBuf::from("/srv/game/Data/level0"));
    }

    #[test]
    fn treats_backslashes_as_separators() {
        let resolved = resolve_under_root(&root(), "Data\\Managed\\core.dll").expect("resolve");
        assert_eq!(resolved, PathBuf::from("/srv/game/Data/Managed/core.dll"));
    }

    #[test]
    fn collapses_inner_parent_segments() {
        let resolved = resolve_under_root(&root(), "./Data/tmp/../level1").expect("resolve");
        assert_eq!(resolved, PathBuf::from("/srv/game/Data/level1"));
    }

    #[test]
    fn rejects_escaping_paths() {
        for candidate in [
            "../../etc/passwd",
            "..\\..\\Windows\\system32\\drivers\\etc\\hosts",
            "Data/../../outside.txt",
            "/etc/passwd",
            "\\absolute.txt",
            "C:/Windows/win.ini",
            "",
            ".",
            "Data/..",
        ] {
            assert!(
                matches!(
                    resolve_under_root(&root(), candidate),
                    Err(UpdaterError::UnsafePath(_))
                ),
                "{candidate:?} should be rejected"
            );
        }
    }

    #[test]
    fn part_path_appends_suffix() {
        let dest = PathBuf::from("/srv/game/Data/level0.assets");
        let part = part_path(&dest);
        assert_eq!(part, PathBuf::from("/srv/game/Data/level0.assets.part"));
        assert!(is_part_file(&part));
        assert!(!is_part_file(&dest));
    }
}
