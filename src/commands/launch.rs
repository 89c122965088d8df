use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::{Result, UpdaterError};
use crate::utils::paths::resolve_under_root;

/// Relative programs are confined to the install root; absolute ones are used as-is.
pub fn resolve_program(install_root: &Path, program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.is_absolute() {
        return Ok(candidate.to_path_buf());
    }
    resolve_under_root(install_root, program)
}

pub fn launch_program(install_root: &Path, program: &str, args: &[String]) -> Result<u32> {
    let exe_path = resolve_program(install_root, program)?;
    if !exe_path.is_file() {
        return Err(UpdaterError::Config(format!(
            "launch target not found: {}",
            exe_path.display()
        )));
    }

    let child = Command::new(&exe_path)
        .current_dir(install_root)
        .args(args)
        .spawn()?;
    tracing::info!("[play] launched {} pid={}", exe_path.display(), child.id());
    Ok(child.id())
}
