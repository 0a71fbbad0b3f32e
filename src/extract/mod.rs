//! Nested archive extraction.
//!
//! The setup tarball holds one makeself installer per variant; each installer
//! holds an install script; the install script carries the real payload
//! tarball after its shell header. This module peels those layers:
//!
//! ```text
//! veracrypt-<v>-setup.tar.bz2        (outer, ArchiveCodec)
//!  └─ veracrypt-<v>-setup-<variant>-x64   (makeself, SelfExtractor --noexec)
//!      └─ *.sh with PACKAGE_START=<N>     (installer::slice_payload)
//!          └─ payload tarball             (inner, ArchiveCodec) → AppDir
//! ```

pub mod installer;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PackError, Result};

pub use installer::{
    find_package_start, line_byte_offset, locate_install_script, slice_payload,
    MakeselfExtractor, SelfExtractor,
};

/// Unpacks a (possibly compressed) tar archive into a directory.
pub trait ArchiveCodec {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Compression detected from an archive's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    None,
}

impl Compression {
    pub fn sniff(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1f, 0x8b]) {
            Compression::Gzip
        } else if magic.starts_with(b"BZh") {
            Compression::Bzip2
        } else {
            Compression::None
        }
    }
}

/// In-process tar + gzip/bzip2 decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    fn unpack_reader<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
        let mut tar = tar::Archive::new(reader);
        tar.set_preserve_permissions(true);
        tar.unpack(dest).map_err(|e| {
            PackError::Extraction(format!(
                "unpacking {} into {}: {}",
                archive.display(),
                dest.display(),
                e
            ))
        })
    }
}

impl ArchiveCodec for NativeCodec {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut file =
            File::open(archive).map_err(PackError::io(format!("opening {}", archive.display())))?;
        let mut magic = [0u8; 3];
        let read = file
            .read(&mut magic)
            .map_err(PackError::io(format!("reading {}", archive.display())))?;
        let compression = Compression::sniff(&magic[..read]);
        debug!(archive = %archive.display(), ?compression, "unpacking");

        fs::create_dir_all(dest).map_err(PackError::io(format!("creating {}", dest.display())))?;

        // reopen rather than seek so the decoder sees the magic bytes
        let reader = BufReader::new(
            File::open(archive).map_err(PackError::io(format!("opening {}", archive.display())))?,
        );
        // pbzip2 and pigz write several concatenated streams
        match compression {
            Compression::Gzip => Self::unpack_reader(MultiGzDecoder::new(reader), archive, dest),
            Compression::Bzip2 => Self::unpack_reader(MultiBzDecoder::new(reader), archive, dest),
            Compression::None => Self::unpack_reader(reader, archive, dest),
        }
    }
}

/// Walks all three layers using injected collaborators.
pub struct NestedExtractor<'a> {
    pub codec: &'a dyn ArchiveCodec,
    pub self_extractor: &'a dyn SelfExtractor,
    /// Leading lines of the install script searched for the marker.
    pub marker_scan_lines: usize,
}

impl NestedExtractor<'_> {
    /// Unpack `setup_archive` down to the payload and lay the payload out in
    /// `app_dir`. Intermediate layers go under `work_dir`.
    pub fn extract(
        &self,
        setup_archive: &Path,
        installer_name: &str,
        work_dir: &Path,
        app_dir: &Path,
    ) -> Result<()> {
        info!("Unpacking {}", setup_archive.display());
        let staging = work_dir.join("setup");
        self.codec.unpack(setup_archive, &staging)?;
        let installer = find_named_file(&staging, installer_name)?;

        let installer_dir = work_dir.join("installer");
        self.self_extractor.extract(&installer, &installer_dir)?;

        let (script, start) = locate_install_script(&installer_dir, self.marker_scan_lines)?;
        info!(
            "Payload starts at line {} of {}",
            start,
            script.file_name().unwrap_or_default().to_string_lossy()
        );

        let payload = work_dir.join("payload.tar");
        let size = slice_payload(&script, start, &payload)?;
        debug!(bytes = size, "payload sliced");

        info!("Unpacking payload into {}", app_dir.display());
        self.codec.unpack(&payload, app_dir)?;
        Ok(())
    }
}

/// Locate `name` anywhere below `dir`.
fn find_named_file(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut seen = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name() == name {
            return Ok(entry.into_path());
        }
        seen.push(entry.file_name().to_string_lossy().into_owned());
    }
    seen.sort();
    Err(PackError::Extraction(format!(
        "installer '{}' not found in setup archive (found: {})",
        name,
        if seen.is_empty() {
            "nothing".to_string()
        } else {
            seen.join(", ")
        }
    )))
}
