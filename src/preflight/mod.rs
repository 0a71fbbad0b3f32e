//! Preflight checks for host tools.
//!
//! Validates that the host has the programs the pipeline shells out to
//! before anything is downloaded. This keeps a missing `curl` from turning
//! into a half-finished build.
//!
//! # Example
//!
//! ```rust
//! use veracrypt_appimage::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("curl") {
//!     println!("curl not installed");
//! }
//!
//! let tools = &[("sh", "dash"), ("tail", "coreutils")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use crate::error::{PackError, Result};

/// Check if a command exists in PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools a makeself header calls while unpacking itself.
///
/// Each tuple is (command_name, package_name).
pub const EXTRACTOR_TOOLS: &[(&str, &str)] = &[
    ("sh", "dash"),
    ("head", "coreutils"),
    ("tail", "coreutils"),
    ("dd", "coreutils"),
    ("cksum", "coreutils"),
    ("md5sum", "coreutils"),
    ("gzip", "gzip"),
];

/// HTTP clients the fetcher can drive, in order of preference.
pub const HTTP_TOOLS: &[(&str, &str)] = &[("curl", "curl"), ("wget", "wget")];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err(MissingDependency)` listing missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(PackError::MissingDependency(msg));
    }

    Ok(())
}

/// Return the first of `candidates` present on the host.
pub fn first_available<'a>(candidates: &[(&'a str, &'a str)]) -> Result<&'a str> {
    candidates
        .iter()
        .find(|(tool, _)| command_exists(tool))
        .map(|(tool, _)| *tool)
        .ok_or_else(|| {
            let msg = candidates
                .iter()
                .map(|(t, p)| format!("  {} (install: {})", t, p))
                .collect::<Vec<_>>()
                .join("\n  or\n");
            PackError::MissingDependency(msg)
        })
}

/// Check everything the extractor needs.
pub fn check_host_tools() -> Result<()> {
    check_required_tools(EXTRACTOR_TOOLS)
}
