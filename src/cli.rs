//! Command-line surface.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Options;
use crate::error::{PackError, Result};
use crate::variant::BuildVariant;

/// Repackage the official VeraCrypt Linux installer as an AppImage.
#[derive(Debug, Parser)]
#[command(name = "veracrypt-appimage")]
pub struct Cli {
    /// Release to package (default: latest published release).
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Where to put the AppImage (default: current directory).
    #[arg(long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Installer flavour: gui, gtk2-gui or console.
    #[arg(long = "type", value_name = "TYPE", default_value = "gui")]
    pub variant: String,

    /// Do not show download progress.
    #[arg(long)]
    pub no_progress: bool,

    /// Keep the work directory and log at debug level.
    #[arg(long)]
    pub debug: bool,

    /// TOML file overriding endpoints and naming.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Validate the flags and resolve defaults. A bad `--type` is an
    /// `InvalidArgument` error, raised before any network activity.
    pub fn into_options(self) -> Result<Options> {
        let variant: BuildVariant = self.variant.parse()?;
        let output_dir = match self.directory {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(PackError::io("resolving current directory"))?,
        };
        Ok(Options {
            version: self.version,
            output_dir,
            variant,
            progress: !self.no_progress,
            debug: self.debug,
        })
    }
}
