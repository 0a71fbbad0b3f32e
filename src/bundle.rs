//! AppDir assembly.
//!
//! `appimagetool` expects, at the top of the AppDir: an `AppRun` entry
//! point, a `.desktop` file and the icon that file names. The payload
//! already provides the `usr/` tree.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{BundleConfig, Config};
use crate::error::{PackError, Result};
use crate::fetch::Transport;
use crate::filesystem::{copy_file, make_executable};

/// Render the static desktop entry.
pub fn desktop_entry(bundle: &BundleConfig) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Exec={exec}\n\
         Icon={icon}\n\
         Terminal=false\n\
         Categories={categories}\n",
        name = bundle.product_name,
        exec = bundle.executable,
        icon = bundle.executable,
        categories = bundle.categories,
    )
}

fn icon_file_name(bundle: &BundleConfig) -> String {
    let ext = Path::new(&bundle.payload_icon)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xpm".to_string());
    format!("{}.{}", bundle.executable, ext)
}

/// Put the icon at the AppDir root: the payload's own if it ships one,
/// otherwise the configured fallback download.
pub fn install_icon(app_dir: &Path, transport: &dyn Transport, config: &Config) -> Result<PathBuf> {
    let dest = app_dir.join(icon_file_name(&config.bundle));
    let shipped = app_dir.join(&config.bundle.payload_icon);

    if shipped.is_file() {
        debug!(src = %shipped.display(), "using payload icon");
        copy_file(&shipped, &dest)?;
    } else {
        info!("Payload has no icon, fetching fallback");
        transport.fetch(&config.endpoints.icon_url, &dest)?;
    }

    let dir_icon = app_dir.join(".DirIcon");
    if dir_icon.symlink_metadata().is_ok() {
        fs::remove_file(&dir_icon)
            .map_err(PackError::io(format!("removing {}", dir_icon.display())))?;
    }
    let target = dest.file_name().unwrap_or_default();
    std::os::unix::fs::symlink(target, &dir_icon)
        .map_err(PackError::io(format!("linking {}", dir_icon.display())))?;

    Ok(dest)
}

pub fn write_desktop_entry(app_dir: &Path, bundle: &BundleConfig) -> Result<PathBuf> {
    let path = app_dir.join(format!("{}.desktop", bundle.executable));
    fs::write(&path, desktop_entry(bundle))
        .map_err(PackError::io(format!("writing {}", path.display())))?;
    Ok(path)
}

pub fn install_launcher(app_dir: &Path, transport: &dyn Transport, config: &Config) -> Result<PathBuf> {
    let path = app_dir.join("AppRun");
    transport.fetch(&config.endpoints.apprun_url, &path)?;
    make_executable(&path)?;
    Ok(path)
}

/// Lay out icon, desktop entry and launcher around the unpacked payload.
pub fn assemble(app_dir: &Path, transport: &dyn Transport, config: &Config) -> Result<()> {
    if !app_dir.is_dir() {
        return Err(PackError::Extraction(format!(
            "payload directory {} is missing",
            app_dir.display()
        )));
    }
    info!("Assembling {}", app_dir.display());
    install_icon(app_dir, transport, config)?;
    write_desktop_entry(app_dir, &config.bundle)?;
    install_launcher(app_dir, transport, config)?;
    Ok(())
}
