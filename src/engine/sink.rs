//! Run output destination.
//!
//! The driver prepares the directory; the engine only writes into it.

use crate::FwCheckError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "output.json";
pub const SNAPSHOT_FILE: &str = "setup_check_info.json";
pub const RUN_LOG_FILE: &str = "UniversalTesterFirmwareSetupCheck.log";

/// Directory receiving the result log, engine snapshot and probe traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSink {
    log_dir: PathBuf,
}

impl OutputSink {
    /// Use an existing directory.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        OutputSink {
            log_dir: log_dir.into(),
        }
    }

    /// Create the directory if needed.
    pub fn prepare(log_dir: impl AsRef<Path>) -> Result<Self, FwCheckError> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).map_err(|e| FwCheckError::Io {
            context: format!("creating {}", log_dir.display()),
            source: e,
        })?;
        Ok(OutputSink::new(log_dir))
    }

    /// Remove results and snapshot left by an earlier run.
    pub fn clear_previous(&self) -> Result<(), FwCheckError> {
        for path in [self.results_path(), self.snapshot_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(FwCheckError::Io {
                        context: format!("removing {}", path.display()),
                        source: e,
                    })
                }
            }
        }
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn results_path(&self) -> PathBuf {
        self.log_dir.join(RESULTS_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.log_dir.join(SNAPSHOT_FILE)
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.log_dir.join(RUN_LOG_FILE)
    }

    /// `<probe>_callfail.log`, with path-hostile characters replaced.
    pub fn trace_path(&self, probe: &str) -> PathBuf {
        let stem: String = probe
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.log_dir.join(format!("{}_callfail.log", stem))
    }

    /// Write `value` as pretty JSON, replacing any previous file.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), FwCheckError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| FwCheckError::Json {
            context: format!("serializing {}", path.display()),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| FwCheckError::Io {
            context: format!("writing {}", path.display()),
            source: e,
        })
    }

    /// Write a probe's diagnostic trace, replacing any previous one.
    pub fn write_trace(&self, probe: &str, trace: &str) -> Result<PathBuf, FwCheckError> {
        let path = self.trace_path(probe);
        fs::write(&path, trace).map_err(|e| FwCheckError::Io {
            context: format!("writing {}", path.display()),
            source: e,
        })?;
        Ok(path)
    }
}
