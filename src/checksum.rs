//! SHA-512 verification against a `sha512sum`-style manifest.
//!
//! Manifest lines look like `<hexdigest>  <filename>` (two spaces, text
//! mode) or `<hexdigest> *<filename>` (binary mode). Only an exact filename
//! match counts; a missing entry fails verification.

use sha2::{Digest, Sha512};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PackError, Result};

/// One `<digest> <filename>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub digest: String,
    pub filename: String,
}

/// Computes hex digests of files.
pub trait DigestProvider {
    /// Lowercase hex digest of the full file contents.
    fn hex_digest(&self, path: &Path) -> Result<String>;
}

/// Native SHA-512, streamed in 1 MiB chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Digest;

impl DigestProvider for Sha512Digest {
    fn hex_digest(&self, path: &Path) -> Result<String> {
        let f = File::open(path).map_err(PackError::io(format!("opening {}", path.display())))?;
        let mut r = BufReader::new(f);
        let mut hasher = Sha512::new();
        let mut buf = vec![0u8; 1024 * 1024];
        loop {
            let n = r
                .read(&mut buf)
                .map_err(PackError::io(format!("reading {}", path.display())))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Parse manifest text. Blank and malformed lines are skipped.
pub fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    text.lines().filter_map(parse_manifest_line).collect()
}

fn parse_manifest_line(line: &str) -> Option<ManifestEntry> {
    let line = line.trim_end_matches('\r');
    let (digest, rest) = line.split_once(' ')?;
    if digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    // "  name" (text mode) or " *name" (binary mode)
    let filename = rest
        .strip_prefix(' ')
        .or_else(|| rest.strip_prefix('*'))?;
    if filename.is_empty() {
        return None;
    }
    Some(ManifestEntry {
        digest: digest.to_string(),
        filename: filename.to_string(),
    })
}

/// Expected digest for `filename`.
pub fn expected_digest(manifest: &[ManifestEntry], filename: &str) -> Result<String> {
    manifest
        .iter()
        .find(|entry| entry.filename == filename)
        .map(|entry| entry.digest.clone())
        .ok_or_else(|| PackError::ChecksumMismatch {
            file: filename.to_string(),
            reason: "no entry for this file in the checksum manifest".to_string(),
        })
}

/// True iff the file's digest equals `expected_hex` (hex case ignored).
pub fn verify(provider: &dyn DigestProvider, path: &Path, expected_hex: &str) -> Result<bool> {
    let actual = provider.hex_digest(path)?;
    debug!(path = %path.display(), %actual, expected = expected_hex, "digest");
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}

/// Verify `path` against the entry for its file name in `manifest_path`.
pub fn verify_against_manifest(
    provider: &dyn DigestProvider,
    path: &Path,
    manifest_path: &Path,
) -> Result<()> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let text = fs::read_to_string(manifest_path).map_err(|e| PackError::ChecksumMismatch {
        file: filename.clone(),
        reason: format!("cannot read manifest {}: {}", manifest_path.display(), e),
    })?;
    let manifest = parse_manifest(&text);
    let expected = expected_digest(&manifest, &filename)?;

    if !verify(provider, path, &expected)? {
        return Err(PackError::ChecksumMismatch {
            file: filename,
            reason: "SHA-512 digest differs from the manifest".to_string(),
        });
    }

    if expected.len() >= 16 {
        info!(
            "SHA512 OK: {}...{} {}",
            &expected[..8],
            &expected[expected.len() - 8..],
            filename
        );
    }
    Ok(())
}
