//! The end-to-end build: resolve → fetch → verify → extract → assemble →
//! package → relocate.
//!
//! Every collaborator that touches the outside world is injected through
//! [`BuildContext`], so tests can swap the network and the packaging tool
//! for local fakes.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::bundle;
use crate::checksum::{verify_against_manifest, DigestProvider, Sha512Digest};
use crate::config::{Config, Options};
use crate::error::{PackError, Result};
use crate::extract::{
    ArchiveCodec, MakeselfExtractor, NativeCodec, NestedExtractor, SelfExtractor,
};
use crate::fetch::Transport;
use crate::package::{ensure_output_dir, relocate, AppImageTool, PackagingTool};
use crate::resolve::resolve_version;

/// Scratch directory owned by one run. Removed on drop unless retained.
pub struct WorkDir {
    dir: Option<TempDir>,
    retain: bool,
}

impl WorkDir {
    pub fn create(retain: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("veracrypt-appimage-")
            .tempdir()
            .map_err(PackError::io("creating work directory"))?;
        info!("Work directory: {}", dir.path().display());
        Ok(Self {
            dir: Some(dir),
            retain,
        })
    }

    pub fn path(&self) -> &Path {
        // only None while dropping
        self.dir.as_ref().map(TempDir::path).unwrap_or(Path::new(""))
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.retain {
            let path = dir.keep();
            warn!("Keeping work directory {}", path.display());
        } else if let Err(e) = dir.close() {
            warn!("Failed to remove work directory: {}", e);
        }
    }
}

/// Everything one build needs, passed explicitly to each step.
pub struct BuildContext<'a> {
    pub config: &'a Config,
    pub options: &'a Options,
    pub transport: &'a dyn Transport,
    pub digest: &'a dyn DigestProvider,
    pub codec: &'a dyn ArchiveCodec,
    pub self_extractor: &'a dyn SelfExtractor,
    pub packager: &'a mut dyn PackagingTool,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub version: String,
    pub artifact: PathBuf,
}

/// Run the whole pipeline.
pub fn run(ctx: BuildContext<'_>) -> Result<BuildOutcome> {
    let BuildContext {
        config,
        options,
        transport,
        digest,
        codec,
        self_extractor,
        packager,
    } = ctx;

    // before any network or extraction work
    let output_dir = ensure_output_dir(&options.output_dir)?;

    let version = resolve_version(options.version.as_deref(), transport, config)?;
    info!("Packaging VeraCrypt {} ({})", version, options.variant);

    let work = WorkDir::create(options.debug)?;
    let work_dir = work.path();

    let setup = work_dir.join(config.endpoints.setup_filename(&version));
    let manifest = work_dir.join(config.endpoints.manifest_filename(&version));
    transport.fetch(&config.endpoints.setup_url(&version), &setup)?;
    transport.fetch(&config.endpoints.checksum_url(&version), &manifest)?;
    verify_against_manifest(digest, &setup, &manifest)?;

    let app_dir = work_dir.join(config.bundle.app_dir_name());
    NestedExtractor {
        codec,
        self_extractor,
        marker_scan_lines: config.extract.marker_scan_lines,
    }
    .extract(
        &setup,
        &options.variant.installer_name(&version),
        work_dir,
        &app_dir,
    )?;

    bundle::assemble(&app_dir, transport, config)?;

    packager.provision(transport, work_dir)?;
    let built = work_dir.join(config.bundle.output_filename(&version, options.variant));
    packager.build(&app_dir, &built)?;

    let artifact = relocate(&built, &output_dir)?;
    info!("Built {}", artifact.display());

    Ok(BuildOutcome { version, artifact })
}

/// Run with the production collaborators: native digest and codec, makeself
/// self-extraction and a downloaded `appimagetool`.
pub fn run_default(
    config: &Config,
    options: &Options,
    transport: &dyn Transport,
) -> Result<BuildOutcome> {
    let mut packager = AppImageTool::new(
        config.endpoints.appimagetool_url.clone(),
        config.bundle.arch.clone(),
    );
    run(BuildContext {
        config,
        options,
        transport,
        digest: &Sha512Digest,
        codec: &NativeCodec,
        self_extractor: &MakeselfExtractor,
        packager: &mut packager,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fixtures::{bzip2, gzip, install_script, makeself_installer, tar_bytes};
    use crate::variant::BuildVariant;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    const VERSION: &str = "1.26.24";

    /// Serves canned bodies per URL and records every request.
    #[derive(Default)]
    struct FakeTransport {
        bodies: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn serve(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
            self.bodies.insert(url.into(), body.into());
        }
    }

    impl Transport for FakeTransport {
        fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
            self.requests.borrow_mut().push(url.to_string());
            let body = self.bodies.get(url).ok_or_else(|| PackError::Download {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
            fs::write(dest, body).unwrap();
            Ok(())
        }

        fn fetch_text(&self, url: &str) -> Result<String> {
            self.requests.borrow_mut().push(url.to_string());
            self.bodies
                .get(url)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .ok_or_else(|| PackError::Download {
                    url: url.to_string(),
                    reason: "404 Not Found".to_string(),
                })
        }
    }

    /// Copies the AppDir's desktop file to the output as a stand-in image.
    #[derive(Default)]
    struct FakePackager {
        provisioned: bool,
        built_from: RefCell<Option<PathBuf>>,
    }

    impl PackagingTool for FakePackager {
        fn provision(&mut self, _transport: &dyn Transport, _work_dir: &Path) -> Result<()> {
            self.provisioned = true;
            Ok(())
        }

        fn build(&self, app_dir: &Path, output: &Path) -> Result<()> {
            assert!(self.provisioned);
            for required in ["AppRun", "veracrypt.desktop", "veracrypt.xpm", "usr/bin/veracrypt"] {
                assert!(app_dir.join(required).exists(), "AppDir lacks {required}");
            }
            fs::copy(app_dir.join("veracrypt.desktop"), output).unwrap();
            *self.built_from.borrow_mut() = Some(app_dir.to_path_buf());
            Ok(())
        }
    }

    fn setup_tarball() -> Vec<u8> {
        let payload = gzip(&tar_bytes(&[
            ("usr/bin/veracrypt", 0o755, b"#!/bin/sh\necho veracrypt\n"),
            ("usr/share/pixmaps/veracrypt.xpm", 0o644, b"/* XPM */"),
        ]));
        let script = install_script(&payload, 42);
        let installer = makeself_installer("veracrypt_install_console_x64.sh", &script);
        bzip2(&tar_bytes(&[
            ("veracrypt-1.26.24-setup-console-x64", 0o755, &installer),
            ("veracrypt-1.26.24-setup-gui-x64", 0o755, b"unused"),
        ]))
    }

    fn sha512_hex(data: &[u8]) -> String {
        use sha2::{Digest, Sha512};
        format!("{:x}", Sha512::digest(data))
    }

    fn serving_release(config: &Config, manifest_digest: Option<String>) -> FakeTransport {
        let setup = setup_tarball();
        let digest = manifest_digest.unwrap_or_else(|| sha512_hex(&setup));
        let mut transport = FakeTransport::default();
        transport.serve(config.endpoints.setup_url(VERSION), setup);
        transport.serve(
            config.endpoints.checksum_url(VERSION),
            format!(
                "{}  veracrypt-1.26.24-Debian-12-amd64.deb\n{}  veracrypt-1.26.24-setup.tar.bz2\n",
                "0".repeat(128),
                digest
            ),
        );
        transport.serve(config.endpoints.apprun_url.clone(), "#!/bin/sh\n");
        transport.serve(
            config.endpoints.release_api.clone(),
            r#"{"tag_name":"VeraCrypt_1.26.24"}"#,
        );
        transport
    }

    fn options(output_dir: &Path, version: Option<&str>) -> Options {
        Options {
            version: version.map(str::to_string),
            output_dir: output_dir.to_path_buf(),
            variant: BuildVariant::Console,
            progress: false,
            debug: false,
        }
    }

    #[test]
    fn builds_console_bundle_end_to_end() {
        let out = TempDir::new().unwrap();
        let config = Config::default();
        let transport = serving_release(&config, None);
        let mut packager = FakePackager::default();
        let options = options(out.path(), Some(VERSION));

        let outcome = run(BuildContext {
            config: &config,
            options: &options,
            transport: &transport,
            digest: &Sha512Digest,
            codec: &NativeCodec,
            self_extractor: &MakeselfExtractor,
            packager: &mut packager,
        })
        .unwrap();

        assert_eq!(outcome.version, VERSION);
        let expected = out.path().canonicalize().unwrap().join("Veracrypt-1.26.24-console-x86_64");
        assert_eq!(outcome.artifact, expected);
        assert!(expected.is_file());

        // work directory is gone
        let app_dir = packager.built_from.borrow().clone().unwrap();
        assert!(!app_dir.exists());
        assert!(!transport
            .requests
            .borrow()
            .contains(&config.endpoints.release_api));
    }

    #[test]
    fn resolves_latest_when_no_version_given() {
        let out = TempDir::new().unwrap();
        let config = Config::default();
        let transport = serving_release(&config, None);
        let mut packager = FakePackager::default();
        let options = options(out.path(), None);

        let outcome = run(BuildContext {
            config: &config,
            options: &options,
            transport: &transport,
            digest: &Sha512Digest,
            codec: &NativeCodec,
            self_extractor: &MakeselfExtractor,
            packager: &mut packager,
        })
        .unwrap();

        assert_eq!(outcome.version, VERSION);
        assert_eq!(transport.requests.borrow()[0], config.endpoints.release_api);
    }

    #[test]
    fn altered_digest_stops_before_extraction() {
        let out = TempDir::new().unwrap();
        let config = Config::default();
        let mut digest = sha512_hex(&setup_tarball());
        let flipped = if digest.starts_with('0') { "1" } else { "0" };
        digest.replace_range(0..1, flipped);
        let transport = serving_release(&config, Some(digest));
        let mut packager = FakePackager::default();
        let options = options(out.path(), Some(VERSION));

        let err = run(BuildContext {
            config: &config,
            options: &options,
            transport: &transport,
            digest: &Sha512Digest,
            codec: &NativeCodec,
            self_extractor: &MakeselfExtractor,
            packager: &mut packager,
        })
        .unwrap_err();

        assert_eq!(err.kind(), "ChecksumMismatchError");
        assert!(!packager.provisioned);
        assert!(packager.built_from.borrow().is_none());
        // nothing past the manifest was requested
        assert!(!transport
            .requests
            .borrow()
            .contains(&config.endpoints.apprun_url));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_output_dir_fails_before_network() {
        let out = TempDir::new().unwrap();
        let config = Config::default();
        let transport = serving_release(&config, None);
        let mut packager = FakePackager::default();
        let options = options(&out.path().join("missing"), None);

        let err = run(BuildContext {
            config: &config,
            options: &options,
            transport: &transport,
            digest: &Sha512Digest,
            codec: &NativeCodec,
            self_extractor: &MakeselfExtractor,
            packager: &mut packager,
        })
        .unwrap_err();

        assert_eq!(err.kind(), "OutputError");
        assert!(transport.requests.borrow().is_empty());
    }

    #[test]
    fn narrow_scan_bound_reports_missing_marker() {
        let out = TempDir::new().unwrap();
        let mut config = Config::default();
        // marker sits on line 2 of the install script
        config.extract.marker_scan_lines = 1;
        let transport = serving_release(&config, None);
        let mut packager = FakePackager::default();
        let options = options(out.path(), Some(VERSION));

        let err = run(BuildContext {
            config: &config,
            options: &options,
            transport: &transport,
            digest: &Sha512Digest,
            codec: &NativeCodec,
            self_extractor: &MakeselfExtractor,
            packager: &mut packager,
        })
        .unwrap_err();
        assert_eq!(err.kind(), "MarkerNotFoundError");
    }

    #[test]
    fn debug_retains_work_directory() {
        let work = WorkDir::create(true).unwrap();
        let path = work.path().to_path_buf();
        drop(work);
        assert!(path.is_dir());
        fs::remove_dir_all(&path).unwrap();

        let work = WorkDir::create(false).unwrap();
        let path = work.path().to_path_buf();
        drop(work);
        assert!(!path.exists());
    }
}
