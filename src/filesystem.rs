//! Filesystem helpers shared by the assembler and the packager.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::{PackError, Result};

/// Move a file by renaming, with fallback to copy+delete when `src` and
/// `dst` live on different filesystems (work directories usually sit on a
/// tmpfs).
pub fn atomic_move(src: &Path, dst: &Path) -> std::io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

/// Add `rwxr-xr-x` to the file's mode.
pub fn make_executable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .map_err(PackError::io(format!("inspecting {}", path.display())))?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms).map_err(PackError::io(format!("chmod {}", path.display())))
}

/// Copy a single file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .map_err(PackError::io(format!("creating {}", parent.display())))?;
    }
    fs::copy(src, dst).map_err(PackError::io(format!(
        "copying {} to {}",
        src.display(),
        dst.display()
    )))?;
    Ok(())
}
