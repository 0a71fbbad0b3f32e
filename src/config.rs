//! Build configuration.
//!
//! [`Config`] holds everything that is fixed per deployment (endpoints,
//! naming, extractor limits) and can be overridden from a TOML file.
//! [`Options`] holds the per-invocation choices coming from the CLI.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackError, Result};
use crate::variant::BuildVariant;

/// Placeholder substituted with the release version in URL templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub endpoints: Endpoints,
    pub release: ReleaseConfig,
    pub extract: ExtractConfig,
    pub bundle: BundleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// GitHub "latest release" API endpoint.
    pub release_api: String,
    /// Setup tarball, `{version}` substituted.
    pub setup_url: String,
    /// SHA-512 manifest, `{version}` substituted.
    pub checksum_url: String,
    pub icon_url: String,
    pub apprun_url: String,
    pub appimagetool_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            release_api: "https://api.github.com/repos/veracrypt/VeraCrypt/releases/latest"
                .to_string(),
            setup_url:
                "https://launchpad.net/veracrypt/trunk/{version}/+download/veracrypt-{version}-setup.tar.bz2"
                    .to_string(),
            checksum_url:
                "https://launchpad.net/veracrypt/trunk/{version}/+download/veracrypt-{version}-sha512sum.txt"
                    .to_string(),
            icon_url:
                "https://raw.githubusercontent.com/veracrypt/VeraCrypt/master/src/Resources/Icons/VeraCrypt-256x256.xpm"
                    .to_string(),
            apprun_url:
                "https://github.com/AppImage/AppImageKit/releases/download/continuous/AppRun-x86_64"
                    .to_string(),
            appimagetool_url:
                "https://github.com/AppImage/appimagetool/releases/download/continuous/appimagetool-x86_64.AppImage"
                    .to_string(),
        }
    }
}

impl Endpoints {
    pub fn setup_url(&self, version: &str) -> String {
        self.setup_url.replace(VERSION_PLACEHOLDER, version)
    }

    pub fn checksum_url(&self, version: &str) -> String {
        self.checksum_url.replace(VERSION_PLACEHOLDER, version)
    }

    /// Last path segment of the setup URL. The checksum manifest keys its
    /// entries by this name.
    pub fn setup_filename(&self, version: &str) -> String {
        url_file_name(&self.setup_url(version))
    }

    pub fn manifest_filename(&self, version: &str) -> String {
        url_file_name(&self.checksum_url(version))
    }
}

fn url_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default().to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Stripped from the release tag to obtain the bare version.
    pub tag_prefix: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "VeraCrypt_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// How many leading lines of the install script may hold the
    /// `PACKAGE_START=` marker. Upstream installers keep it well inside 100.
    pub marker_scan_lines: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            marker_scan_lines: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    pub product_name: String,
    pub executable: String,
    /// Icon path relative to the payload root.
    pub payload_icon: String,
    pub categories: String,
    /// Leading component of the output file name.
    pub output_prefix: String,
    pub arch: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            product_name: "VeraCrypt".to_string(),
            executable: "veracrypt".to_string(),
            payload_icon: "usr/share/pixmaps/veracrypt.xpm".to_string(),
            categories: "Utility;Security;".to_string(),
            output_prefix: "Veracrypt".to_string(),
            arch: "x86_64".to_string(),
        }
    }
}

impl BundleConfig {
    /// e.g. `Veracrypt-1.26.24-console-x86_64`
    pub fn output_filename(&self, version: &str, variant: BuildVariant) -> String {
        format!("{}-{}-{}-{}", self.output_prefix, version, variant, self.arch)
    }

    pub fn app_dir_name(&self) -> String {
        format!("{}.AppDir", self.product_name)
    }
}

impl Config {
    /// Load configuration, falling back to built-in defaults when no file is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).map_err(|e| PackError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| PackError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: &str| PackError::Config {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.extract.marker_scan_lines == 0 {
            return Err(invalid("extract.marker_scan_lines must be at least 1"));
        }
        if !self.endpoints.setup_url.contains(VERSION_PLACEHOLDER) {
            return Err(invalid("endpoints.setup_url must contain {version}"));
        }
        if !self.endpoints.checksum_url.contains(VERSION_PLACEHOLDER) {
            return Err(invalid("endpoints.checksum_url must contain {version}"));
        }
        if self.endpoints.setup_filename("0").is_empty()
            || self.endpoints.manifest_filename("0").is_empty()
        {
            return Err(invalid("endpoint URLs must end in a file name"));
        }
        if self.bundle.executable.trim().is_empty() {
            return Err(invalid("bundle.executable must not be empty"));
        }
        Ok(())
    }
}

/// Per-invocation options, built from the command line.
#[derive(Debug, Clone)]
pub struct Options {
    /// Explicit release; `None` resolves the latest.
    pub version: Option<String>,
    pub output_dir: PathBuf,
    pub variant: BuildVariant,
    pub progress: bool,
    /// Keep the work directory after the run.
    pub debug: bool,
}
