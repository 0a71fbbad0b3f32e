//! Downloads through a host HTTP client.
//!
//! The transport is chosen once at startup: `curl` if present, otherwise
//! `wget`. Both are driven in "fail on HTTP error" mode so a 404 page never
//! lands on disk as if it were the artifact.

use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PackError, Result};
use crate::preflight::{first_available, HTTP_TOOLS};
use crate::process::Cmd;

/// Anything that can move bytes from a URL to the local machine.
pub trait Transport {
    /// Download `url` into `dest`, replacing any existing file.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;

    /// Download `url` and return the body as text.
    fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Supported host HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpTool {
    Curl,
    Wget,
}

impl HttpTool {
    fn from_program(name: &str) -> Option<Self> {
        match name {
            "curl" => Some(HttpTool::Curl),
            "wget" => Some(HttpTool::Wget),
            _ => None,
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            HttpTool::Curl => "curl",
            HttpTool::Wget => "wget",
        }
    }
}

/// [`Transport`] backed by `curl` or `wget`.
#[derive(Debug, Clone)]
pub struct CommandTransport {
    tool: HttpTool,
    progress: bool,
}

impl CommandTransport {
    pub fn new(tool: HttpTool, progress: bool) -> Self {
        Self { tool, progress }
    }

    pub fn tool(&self) -> HttpTool {
        self.tool
    }

    fn download_cmd(&self, url: &str, dest: &Path) -> Cmd {
        match self.tool {
            HttpTool::Curl => {
                let cmd = Cmd::new("curl").args(["--fail", "--location"]);
                let cmd = if self.progress {
                    cmd.arg("--progress-bar")
                } else {
                    cmd.args(["--silent", "--show-error"])
                };
                cmd.arg("--output").arg_path(dest).arg(url)
            }
            HttpTool::Wget => {
                let cmd = Cmd::new("wget").arg("--quiet");
                let cmd = if self.progress {
                    cmd.arg("--show-progress")
                } else {
                    cmd
                };
                cmd.arg("--output-document").arg_path(dest).arg(url)
            }
        }
    }

    fn text_cmd(&self, url: &str) -> Cmd {
        match self.tool {
            HttpTool::Curl => Cmd::new("curl")
                .args(["--fail", "--location", "--silent", "--show-error"])
                .arg(url),
            HttpTool::Wget => Cmd::new("wget")
                .args(["--quiet", "--output-document", "-"])
                .arg(url),
        }
    }
}

impl Transport for CommandTransport {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading {}", url);
        debug!(dest = %dest.display(), tool = self.tool.program(), "fetch");

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(PackError::io(format!("creating {}", parent.display())))?;
        }

        let result = self
            .download_cmd(url, dest)
            .error_msg(format!("{} could not download {}", self.tool.program(), url))
            .run_interactive();

        if let Err(e) = result {
            // A failed wget leaves an empty file behind.
            let _ = fs::remove_file(dest);
            return Err(PackError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        if !dest.is_file() {
            return Err(PackError::Download {
                url: url.to_string(),
                reason: format!("{} reported success but wrote nothing", self.tool.program()),
            });
        }
        Ok(())
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        debug!(url, tool = self.tool.program(), "fetch_text");
        self.text_cmd(url)
            .error_msg(format!("{} could not fetch {}", self.tool.program(), url))
            .run()
            .map(|out| out.stdout)
            .map_err(|e| PackError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Pick the HTTP client once, before any network activity.
pub fn select_transport(progress: bool) -> Result<CommandTransport> {
    let program = first_available(HTTP_TOOLS)?;
    let tool = HttpTool::from_program(program).ok_or_else(|| {
        PackError::MissingDependency(format!("  unsupported HTTP client '{program}'"))
    })?;
    debug!(tool = tool.program(), "selected HTTP client");
    Ok(CommandTransport::new(tool, progress))
}
