//! External process execution.
//!
//! The signing core never spawns processes directly. It shapes a
//! [`CommandBuilder`] and hands it to a [`ProcessRunner`], which turns a
//! non-zero exit into [`CodesignError::ToolFailed`] carrying the tool's output.

use std::ffi::{OsStr, OsString};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{CodesignError, Result};

/// A program plus its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
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

    /// Program name as a string, for messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Render as a single shell-like line for logging.
    pub fn to_command_line(&self) -> String {
        let mut parts = vec![self.program_name()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Captured output of a successful process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out.trim().to_string()
    }
}

/// Runs external commands, blocking until they finish.
pub trait ProcessRunner {
    /// Execute `command`. A non-zero exit status must be reported as
    /// [`CodesignError::ToolFailed`].
    fn run(&self, command: &CommandBuilder) -> Result<ProcessOutput>;
}

/// Runs commands on the local machine with `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandBuilder) -> Result<ProcessOutput> {
        let program = command.program_name();
        let resolved = which::which(&command.program).map_err(|_| CodesignError::ToolNotFound {
            program: program.clone(),
        })?;

        debug!("Running: {}", command.to_command_line());

        let output = Command::new(resolved)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CodesignError::io(format!("failed to launch {program}"), e))?;

        let captured = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(CodesignError::ToolFailed {
                program,
                code,
                output: captured.combined(),
            });
        }

        Ok(captured)
    }
}
