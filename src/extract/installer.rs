//! Self-extracting installer handling.
//!
//! The VeraCrypt setup binaries are makeself archives. Unpacking one with
//! `--noexec` yields an install script: a shell header followed by a
//! compressed tarball. The header announces where the tarball begins with a
//! `PACKAGE_START=<line>` assignment, which is all we need to cut the payload
//! out without running any of the vendor's install logic.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PackError, Result};
use crate::process::Cmd;

const MARKER_PREFIX: &[u8] = b"PACKAGE_START=";

/// Upper bound on bytes read while looking for the marker, so a candidate
/// without newlines is never slurped whole.
pub const MARKER_SCAN_BYTES: u64 = 1024 * 1024;

/// Unpacks a self-extracting installer without running it.
pub trait SelfExtractor {
    fn extract(&self, installer: &Path, target: &Path) -> Result<()>;
}

/// Runs a makeself archive in `--noexec` mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeselfExtractor;

impl SelfExtractor for MakeselfExtractor {
    fn extract(&self, installer: &Path, target: &Path) -> Result<()> {
        info!("Self-extracting {}", installer.display());
        Cmd::new("sh")
            .arg_path(installer)
            .args(["--noexec", "--nox11", "--target"])
            .arg_path(target)
            .error_msg(format!(
                "self-extraction of {} failed",
                installer.display()
            ))
            .run()
            .map_err(|e| PackError::Extraction(e.to_string()))?;

        if !target.is_dir() {
            return Err(PackError::Extraction(format!(
                "installer {} produced no directory at {}",
                installer.display(),
                target.display()
            )));
        }
        Ok(())
    }
}

fn marker_not_found(path: &Path, reason: impl Into<String>) -> PackError {
    PackError::MarkerNotFound {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn parse_marker(line: &[u8]) -> Option<u64> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let digits = line.strip_prefix(MARKER_PREFIX)?;
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Find the `PACKAGE_START=<N>` line within the first `scan_lines` lines and
/// return `N` (1-based).
///
/// Only the head is scanned (at most [`MARKER_SCAN_BYTES`] as well): past
/// the header the file is compressed data, and a stray byte sequence there
/// must never be mistaken for the marker.
pub fn find_package_start(path: &Path, scan_lines: usize) -> Result<u64> {
    let file = File::open(path).map_err(PackError::io(format!("opening {}", path.display())))?;
    let mut reader = BufReader::new(file.take(MARKER_SCAN_BYTES));
    let mut line = Vec::new();

    for _ in 0..scan_lines {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(PackError::io(format!("reading {}", path.display())))?;
        if n == 0 {
            break;
        }
        if let Some(start) = parse_marker(&line) {
            if start == 0 {
                return Err(marker_not_found(path, "PACKAGE_START=0 is not a line number"));
            }
            debug!(path = %path.display(), start, "found payload marker");
            return Ok(start);
        }
    }

    Err(marker_not_found(
        path,
        format!(
            "no PACKAGE_START=<line> within the first {scan_lines} lines ({MARKER_SCAN_BYTES} bytes)"
        ),
    ))
}

/// Byte offset at which 1-based line `line_no` starts.
///
/// Counts `\n` bytes only, so the result matches `tail -n +<line_no>`.
pub fn line_byte_offset(path: &Path, line_no: u64) -> Result<u64> {
    if line_no == 0 {
        return Err(marker_not_found(path, "line numbers start at 1"));
    }

    let file = File::open(path).map_err(PackError::io(format!("opening {}", path.display())))?;
    let len = file
        .metadata()
        .map_err(PackError::io(format!("inspecting {}", path.display())))?
        .len();
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut offset = 0u64;

    for current in 1..line_no {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(PackError::io(format!("reading {}", path.display())))?;
        if n == 0 || line.last() != Some(&b'\n') {
            return Err(marker_not_found(
                path,
                format!(
                    "PACKAGE_START={} points past the end of the file (only {} complete lines)",
                    line_no,
                    current - 1
                ),
            ));
        }
        offset += n as u64;
    }

    if offset >= len {
        return Err(marker_not_found(
            path,
            format!("no payload bytes after line {line_no}"),
        ));
    }
    Ok(offset)
}

/// Copy everything from the start of line `line_no` to the end of `script`
/// into `dest`. Returns the number of bytes written.
pub fn slice_payload(script: &Path, line_no: u64, dest: &Path) -> Result<u64> {
    let offset = line_byte_offset(script, line_no)?;

    let mut input =
        File::open(script).map_err(PackError::io(format!("opening {}", script.display())))?;
    input
        .seek(SeekFrom::Start(offset))
        .map_err(PackError::io(format!("seeking in {}", script.display())))?;

    let mut output =
        File::create(dest).map_err(PackError::io(format!("creating {}", dest.display())))?;
    let copied = io::copy(&mut input, &mut output)
        .map_err(PackError::io(format!("writing {}", dest.display())))?;

    debug!(offset, copied, dest = %dest.display(), "sliced payload");
    Ok(copied)
}

/// Find the install script produced by self-extraction: the `.sh` file under
/// `dir` whose head carries the payload marker.
pub fn locate_install_script(dir: &Path, scan_lines: usize) -> Result<(PathBuf, u64)> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "sh"))
        .collect();
    candidates.sort();

    let mut last_err = None;
    for candidate in &candidates {
        match find_package_start(candidate, scan_lines) {
            Ok(start) => return Ok((candidate.clone(), start)),
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(PackError::MarkerNotFound { path, reason }) if candidates.len() == 1 => {
            PackError::MarkerNotFound { path, reason }
        }
        Some(PackError::Io { action, source }) => PackError::Io { action, source },
        _ => marker_not_found(
            dir,
            format!(
                "none of {} install script candidate(s) carries PACKAGE_START=<line> within the first {} lines",
                candidates.len(),
                scan_lines
            ),
        ),
    })
}
