//! External process execution
//!
//! Database dump and restore tools are run through the [`CommandRunner`]
//! trait so the backup service can be exercised against a fake tool in
//! tests. [`SystemCommandRunner`] is the real implementation on top of
//! `tokio::process`.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{KeepsakeError, KeepsakeResult};

/// A program invocation
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Indexes into `args` that must never be logged
    sensitive: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            sensitive: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append an argument that is redacted in logs and Debug output
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.sensitive.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Value following a `--flag` argument, or the value of `--flag=value`
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let prefix = format!("{}=", flag);
        self.args.iter().enumerate().find_map(|(i, arg)| {
            if let Some(value) = arg.strip_prefix(&prefix) {
                Some(value)
            } else if arg == flag {
                self.args.get(i + 1).map(String::as_str)
            } else {
                None
            }
        })
    }

    /// Command line with sensitive arguments masked
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.clone()];
        for (i, arg) in self.args.iter().enumerate() {
            if self.sensitive.contains(&i) {
                match arg.split_once('=') {
                    Some((flag, _)) if flag.starts_with("--") => parts.push(format!("{}=***", flag)),
                    _ => parts.push("***".to_string()),
                }
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandSpec").field(&self.redacted()).finish()
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr joined for diagnostics
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }

    /// Convert an unsuccessful exit into a command error
    pub fn into_result(self, program: &str) -> KeepsakeResult<CommandOutput> {
        if self.success {
            return Ok(self);
        }

        let status = self
            .status_code
            .map(|c| format!("exit status {}", c))
            .unwrap_or_else(|| "terminated by signal".to_string());
        let detail = self.combined();
        let message = if detail.is_empty() {
            status
        } else {
            format!("{}: {}", status, detail)
        };
        Err(KeepsakeError::command(program, message))
    }
}

/// Runs external programs
///
/// `Err` is reserved for programs that could not be started; a program
/// that ran and failed is reported through [`CommandOutput::success`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> KeepsakeResult<CommandOutput>;
}

/// Runs programs on the host with `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> KeepsakeResult<CommandOutput> {
        debug!(command = %spec.redacted(), "Running external command");

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| KeepsakeError::command(&spec.program, format!("failed to start: {}", e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
