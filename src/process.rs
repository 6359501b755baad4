//! External process boundary
//!
//! Every external tool the pipeline touches (Open Babel, PACKMOL, sbatch)
//! goes through the [`ExternalProcess`] trait: command + args in, exit code
//! and captured streams out. Control logic stays testable against
//! [`crate::mock::MockProcess`] without any real tool installed.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Captured result of one external tool invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code; -1 when the process was terminated by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error (diagnostic text for log records).
    pub stderr: String,
}

impl ProcessOutput {
    /// True when the tool exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from spawning or waiting on an external process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write stdin of '{program}': {source}")]
    Stdin {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output of '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// One external tool invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Bytes fed to the tool's stdin, if any.
    pub stdin: Option<Vec<u8>>,
    /// Working directory override, if any.
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Build an invocation with no stdin and the inherited working directory.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdin: None,
            cwd: None,
        }
    }

    /// Feed the given bytes to the tool's stdin.
    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// Run the tool from the given directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Narrow capability for running external tools.
pub trait ExternalProcess {
    /// Run the tool to completion, capturing exit status and both streams.
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// Real implementation over `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemProcess;

impl SystemProcess {
    pub fn new() -> Self {
        Self
    }
}

impl ExternalProcess for SystemProcess {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref cwd) = invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        if let Some(ref bytes) = invocation.stdin {
            let mut stdin = child.stdin.take().ok_or_else(|| ProcessError::Stdin {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin not piped"),
            })?;
            stdin.write_all(bytes).map_err(|source| ProcessError::Stdin {
                program: invocation.program.clone(),
                source,
            })?;
            // Close stdin so the tool sees EOF.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .map_err(|source| ProcessError::Wait {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("obabel", &["input.mol", "-O", "input.pdb"])
            .with_cwd("/tmp")
            .with_stdin(b"tolerance 2.0".to_vec());

        assert_eq!(inv.program, "obabel");
        assert_eq!(inv.args.len(), 3);
        assert_eq!(inv.cwd.as_deref(), Some(Path::new("/tmp")));
        assert_eq!(inv.stdin.as_deref(), Some(&b"tolerance 2.0"[..]));
    }

    #[test]
    fn test_process_output_success() {
        let ok = ProcessOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        let failed = ProcessOutput {
            exit_code: 2,
            stdout: String::new(),
            stderr: "boom".to_string(),
        };

        assert!(ok.success());
        assert!(!failed.success());
    }

    #[test]
    fn test_system_process_spawn_error() {
        let process = SystemProcess::new();
        let inv = Invocation::new("definitely-not-a-real-binary-7f3a", &[]);

        let result = process.run(&inv);
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }
}
