//! Input and output file loading.
//!
//! - `manifest`: expected-version manifest (`UniversalTesterFirmwareConfig.json`)
//! - `staged`: static check declarations (`staged_actions.json`)
//!
//! Also reads back a persisted result log for reporting.

pub mod manifest;
pub mod staged;

pub use manifest::{FirmwareManifest, SwitchEntry, SwitchManifest};
pub use staged::StagedAction;

use crate::engine::result::CheckResult;
use crate::FwCheckError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, FwCheckError> {
    let content = fs::read_to_string(path).map_err(|e| FwCheckError::Io {
        context: format!("reading {} {}", what, path.display()),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| FwCheckError::Json {
        context: format!("parsing {} {}", what, path.display()),
        source: e,
    })
}

pub fn load_manifest(path: &Path) -> Result<FirmwareManifest, FwCheckError> {
    load_json(path, "firmware manifest")
}

pub fn load_staged_actions(path: &Path) -> Result<Vec<StagedAction>, FwCheckError> {
    load_json(path, "staged actions")
}

/// Read a result log written by a previous teardown.
pub fn load_results(path: &Path) -> Result<Vec<CheckResult>, FwCheckError> {
    load_json(path, "results")
}
