//! Final packaging with `appimagetool` and delivery to the output directory.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PackError, Result};
use crate::fetch::Transport;
use crate::filesystem::{atomic_move, make_executable};
use crate::process::Cmd;

/// Turns an AppDir into a single distributable file.
pub trait PackagingTool {
    /// Make the tool runnable, downloading it into `work_dir` when needed.
    fn provision(&mut self, transport: &dyn Transport, work_dir: &Path) -> Result<()>;

    /// Produce `output` from `app_dir`.
    fn build(&self, app_dir: &Path, output: &Path) -> Result<()>;
}

/// The upstream `appimagetool` AppImage, fetched per run.
#[derive(Debug, Clone)]
pub struct AppImageTool {
    url: String,
    arch: String,
    path: Option<PathBuf>,
}

impl AppImageTool {
    pub fn new(url: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            arch: arch.into(),
            path: None,
        }
    }
}

impl PackagingTool for AppImageTool {
    fn provision(&mut self, transport: &dyn Transport, work_dir: &Path) -> Result<()> {
        let path = work_dir.join("appimagetool");
        transport.fetch(&self.url, &path)?;
        make_executable(&path)?;
        self.path = Some(path);
        Ok(())
    }

    fn build(&self, app_dir: &Path, output: &Path) -> Result<()> {
        let tool = self.path.as_deref().ok_or_else(|| {
            PackError::PackagingTool("appimagetool was not provisioned".to_string())
        })?;

        info!("Running appimagetool on {}", app_dir.display());
        Cmd::new(tool)
            .arg_path(app_dir)
            .arg_path(output)
            .env("ARCH", &self.arch)
            // containers rarely have FUSE
            .env("APPIMAGE_EXTRACT_AND_RUN", "1")
            .error_msg("appimagetool failed")
            .run()
            .map_err(|e| PackError::PackagingTool(e.to_string()))?;

        if !output.is_file() {
            return Err(PackError::PackagingTool(format!(
                "appimagetool exited cleanly but {} was not created",
                output.display()
            )));
        }
        Ok(())
    }
}

/// Fail early when `dir` cannot receive the final artifact.
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf> {
    let output_error = |reason: String| PackError::Output {
        path: dir.to_path_buf(),
        reason,
    };

    if !dir.exists() {
        return Err(output_error("does not exist".to_string()));
    }
    if !dir.is_dir() {
        return Err(output_error("is not a directory".to_string()));
    }
    // permission bits lie under root and on read-only mounts; probe instead
    tempfile::Builder::new()
        .prefix(".veracrypt-appimage-probe")
        .tempfile_in(dir)
        .map_err(|e| output_error(format!("is not writable: {e}")))?;

    dir.canonicalize()
        .map_err(|e| output_error(format!("cannot be resolved: {e}")))
}

/// Move the built artifact into `output_dir`, replacing an older build of
/// the same name.
pub fn relocate(artifact: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = artifact.file_name().ok_or_else(|| PackError::Output {
        path: output_dir.to_path_buf(),
        reason: format!("artifact path {} has no file name", artifact.display()),
    })?;
    let dest = output_dir.join(name);
    debug!(src = %artifact.display(), dest = %dest.display(), "relocating");

    atomic_move(artifact, &dest).map_err(|e| PackError::Output {
        path: output_dir.to_path_buf(),
        reason: format!("moving {} failed: {}", artifact.display(), e),
    })?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct LocalTransport {
        body: &'static [u8],
    }

    impl Transport for LocalTransport {
        fn fetch(&self, _url: &str, dest: &Path) -> Result<()> {
            fs::write(dest, self.body).unwrap();
            Ok(())
        }

        fn fetch_text(&self, _url: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn output_dir_must_exist() {
        let temp = TempDir::new().unwrap();
        let err = ensure_output_dir(&temp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), "OutputError");
    }

    #[test]
    fn output_dir_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        let err = ensure_output_dir(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn output_dir_probe_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        ensure_output_dir(temp.path()).unwrap();
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_output_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // root ignores permission bits
        let probe = fs::write(locked.join("probe"), "x");
        if probe.is_ok() {
            return;
        }
        let err = ensure_output_dir(&locked).unwrap_err();
        assert_eq!(err.kind(), "OutputError");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn relocate_moves_artifact() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");
        let out = temp.path().join("out");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir_all(&out).unwrap();
        let artifact = work.join("Veracrypt-1.26.24-console-x86_64");
        fs::write(&artifact, "appimage").unwrap();

        let dest = relocate(&artifact, &out).unwrap();
        assert_eq!(dest, out.join("Veracrypt-1.26.24-console-x86_64"));
        assert!(!artifact.exists());
        assert_eq!(fs::read_to_string(dest).unwrap(), "appimage");
    }

    #[test]
    fn relocate_into_missing_dir_is_output_error() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("a");
        fs::write(&artifact, "x").unwrap();
        let err = relocate(&artifact, &temp.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), "OutputError");
    }

    #[test]
    fn tool_must_be_provisioned() {
        let tool = AppImageTool::new("https://example.invalid/tool", "x86_64");
        let err = tool.build(Path::new("/tmp/a"), Path::new("/tmp/b")).unwrap_err();
        assert_eq!(err.kind(), "PackagingToolError");
    }

    #[test]
    fn tool_runs_with_arch_and_writes_output() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport {
            body: b"#!/bin/sh\n[ \"$ARCH\" = x86_64 ] || exit 9\nprintf 'built from %s' \"$1\" > \"$2\"\n",
        };
        let mut tool = AppImageTool::new("https://example.invalid/tool", "x86_64");
        tool.provision(&transport, temp.path()).unwrap();

        let app_dir = temp.path().join("VeraCrypt.AppDir");
        fs::create_dir_all(&app_dir).unwrap();
        let output = temp.path().join("Veracrypt-1.26.24-gui-x86_64");
        tool.build(&app_dir, &output).unwrap();
        assert!(fs::read_to_string(&output).unwrap().starts_with("built from"));
    }

    #[test]
    fn tool_failure_is_packaging_error() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport {
            body: b"#!/bin/sh\necho 'desktop file invalid' >&2\nexit 1\n",
        };
        let mut tool = AppImageTool::new("https://example.invalid/tool", "x86_64");
        tool.provision(&transport, temp.path()).unwrap();

        let err = tool
            .build(temp.path(), &temp.path().join("out"))
            .unwrap_err();
        assert_eq!(err.kind(), "PackagingToolError");
        assert!(err.to_string().contains("desktop file invalid"));
    }
}
