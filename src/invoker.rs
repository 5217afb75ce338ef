use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info};
use tokio::process::Command;

use crate::error::InvokeError;

/// Captured output beyond this many bytes is truncated.
pub const MAX_OUTPUT_BYTES: usize = 50_000;

/// An external program plus its leading arguments, e.g. `python separation.py`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl FromStr for ExternalCommand {
    type Err = String;

    /// Splits on whitespace; no shell quoting is interpreted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| "command line must name a program".to_string())?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and captured streams of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

fn truncate_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }
    let mut end = max_bytes;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[truncated: showing {}/{} bytes]",
        &output[..end],
        end,
        output.len()
    )
}

/// Run `command` with `inputs` appended as positional arguments.
///
/// The child runs in `cwd` with stdin closed. With a `timeout`, a child that
/// has not exited in time is killed. The child is also killed if the
/// returned future is dropped before completion.
pub async fn invoke(
    command: &ExternalCommand,
    inputs: &[PathBuf],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<ProcessResult, InvokeError> {
    info!(
        "running `{}` with {} input(s) in {}",
        command,
        inputs.len(),
        cwd.display()
    );

    let child = Command::new(&command.program)
        .args(&command.args)
        .args(inputs)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child)
            .await
            .map_err(|_| InvokeError::TimedOut(limit))?,
        None => child.await,
    }
    .map_err(|source| InvokeError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    let result = ProcessResult {
        exit_code: output.status.code(),
        stdout: truncate_output(&String::from_utf8_lossy(&output.stdout), MAX_OUTPUT_BYTES),
        stderr: truncate_output(&String::from_utf8_lossy(&output.stderr), MAX_OUTPUT_BYTES),
    };
    debug!(
        "`{}` exited with {:?} ({} bytes stderr)",
        command,
        result.exit_code,
        result.stderr.len()
    );

    Ok(result)
}
