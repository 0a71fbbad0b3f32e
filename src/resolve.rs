//! Release version resolution.

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::error::{PackError, Result};
use crate::fetch::Transport;

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

/// Return the release to package.
///
/// An explicit version is used verbatim. Otherwise the latest published
/// release is looked up and its tag (e.g. `VeraCrypt_1.26.24`) stripped of
/// the configured prefix.
pub fn resolve_version(
    explicit: Option<&str>,
    transport: &dyn Transport,
    config: &Config,
) -> Result<String> {
    if let Some(version) = explicit {
        if version.is_empty() {
            return Err(PackError::InvalidArgument(
                "--version must not be empty".to_string(),
            ));
        }
        return Ok(version.to_string());
    }

    let url = &config.endpoints.release_api;
    let body = transport
        .fetch_text(url)
        .map_err(|e| PackError::Resolution(format!("querying {url}: {e}")))?;

    let version = version_from_release_json(&body, &config.release.tag_prefix)?;
    info!("Latest release: {}", version);
    Ok(version)
}

/// Extract the bare version from a release-listing JSON document.
pub fn version_from_release_json(body: &str, tag_prefix: &str) -> Result<String> {
    let release: LatestRelease = serde_json::from_str(body)
        .map_err(|e| PackError::Resolution(format!("release listing is not valid JSON: {e}")))?;

    let tag = release
        .tag_name
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PackError::Resolution("release listing has no tag_name".to_string()))?;

    let version = tag.strip_prefix(tag_prefix).ok_or_else(|| {
        PackError::Resolution(format!(
            "release tag '{}' does not start with '{}'",
            tag, tag_prefix
        ))
    })?;

    if version.is_empty() {
        return Err(PackError::Resolution(format!(
            "release tag '{}' carries no version",
            tag
        )));
    }
    Ok(version.to_string())
}
