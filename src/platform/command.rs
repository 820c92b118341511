//! Command execution.
//!
//! Every probe and topology reader goes through [`CommandRunner`], so a run
//! can be replayed against captured tool output.
//!
//! # Graceful Degradation
//!
//! - Command not found / spawn failure: `ProbeError::Command`
//! - Non-zero exit status: `ProbeError::Command` with the trimmed stderr
//! - Non-UTF8 output: `ProbeError::Command`
//!
//! No function in this module will panic.

use crate::probes::ProbeError;
use std::path::PathBuf;
use std::process::Command;

/// Executes one shell command line and returns its stdout.
pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<String, ProbeError>;
}

/// Runs commands through `sh -c` on the local machine.
///
/// Vendor utilities are referenced relative to the tester's working directory
/// (`./utils/pcimem`, `./utils/nvflash_mfg`), so an explicit working
/// directory can be set.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    working_dir: Option<PathBuf>,
}

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner { working_dir: None }
    }

    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        SystemRunner {
            working_dir: Some(dir.into()),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &str) -> Result<String, ProbeError> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| ProbeError::Command {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Command {
                command: command.to_string(),
                message: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| ProbeError::Command {
            command: command.to_string(),
            message: format!("output is not valid UTF-8: {}", e),
        })
    }
}
