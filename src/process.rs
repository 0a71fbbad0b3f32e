//! Thin builder over `std::process::Command` for host tool invocations.
//!
//! Every external program the pipeline touches (`curl`, `wget`, `sh`,
//! `appimagetool`) goes through [`Cmd`], so failures carry the program name,
//! the exit status and whatever the tool wrote to stderr.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured result of a successful command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub stdout: String,
}

/// A command that could not be spawned or exited non-zero.
#[derive(Debug, Clone)]
pub struct CmdError {
    pub program: String,
    pub message: Option<String>,
    pub status: Option<i32>,
    pub stderr: String,
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{message}")?,
            None => write!(f, "{} failed", self.program)?,
        }
        match self.status {
            Some(code) => write!(f, " (exit status {code})")?,
            None => write!(f, " (no exit status)")?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, "\n{stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CmdError {}

/// Builder for a single host command.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            envs: Vec::new(),
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Message used as the headline when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    fn failure(&self, status: Option<i32>, stderr: String) -> CmdError {
        CmdError {
            program: self.program.to_string_lossy().into_owned(),
            message: self.error_msg.clone(),
            status,
            stderr,
        }
    }

    fn spawn_failure(&self, err: std::io::Error) -> CmdError {
        self.failure(None, format!("could not start: {err}"))
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn run(&self) -> Result<CmdOutput, CmdError> {
        debug!(program = ?self.program, args = ?self.args, "running");
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_failure(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(self.failure(output.status.code(), stderr));
        }
        Ok(CmdOutput { stdout })
    }

    /// Run with stdout/stderr attached to the terminal (progress bars, tool
    /// diagnostics). Only the exit status is inspected.
    pub fn run_interactive(&self) -> Result<(), CmdError> {
        debug!(program = ?self.program, args = ?self.args, "running (interactive)");
        let status = self
            .command()
            .stdin(Stdio::null())
            .status()
            .map_err(|e| self.spawn_failure(e))?;
        if !status.success() {
            return Err(self.failure(status.code(), String::new()));
        }
        Ok(())
    }
}
