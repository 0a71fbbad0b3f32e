//! Error taxonomy for the packaging pipeline.
//!
//! Every variant is fatal: the pipeline never retries and never continues
//! past a failed step. The binary maps any of these to exit code 1.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("missing required host tools:\n{0}")]
    MissingDependency(String),

    #[error("could not resolve release version: {0}")]
    Resolution(String),

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("checksum verification failed for '{file}': {reason}")]
    ChecksumMismatch { file: String, reason: String },

    #[error("payload marker not found in '{}': {reason}", path.display())]
    MarkerNotFound { path: PathBuf, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("packaging tool failed: {0}")]
    PackagingTool(String),

    #[error("output directory '{}' unusable: {reason}", path.display())]
    Output { path: PathBuf, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration '{}': {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("I/O error while {action}")]
    Io {
        action: String,
        #[source]
        source: std::io::Error,
    },
}

impl PackError {
    /// Taxonomy name reported next to the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            PackError::MissingDependency(_) => "MissingDependencyError",
            PackError::Resolution(_) => "ResolutionError",
            PackError::Download { .. } => "DownloadError",
            PackError::ChecksumMismatch { .. } => "ChecksumMismatchError",
            PackError::MarkerNotFound { .. } => "MarkerNotFoundError",
            PackError::Extraction(_) => "ExtractionError",
            PackError::PackagingTool(_) => "PackagingToolError",
            PackError::Output { .. } => "OutputError",
            PackError::InvalidArgument(_) => "InvalidArgumentError",
            PackError::Config { .. } => "ConfigError",
            PackError::Io { .. } => "IoError",
        }
    }

    pub(crate) fn io(action: impl Into<String>) -> impl FnOnce(std::io::Error) -> PackError {
        let action = action.into();
        move |source| PackError::Io { action, source }
    }
}

pub type Result<T> = std::result::Result<T, PackError>;
