//! utester-fwcheck library
//!
//! Firmware setup verification for multi-board GPU tester rigs.
//!
//! The crate discovers the installed hardware topology, derives the firmware
//! components that must be present, reads their live version strings through
//! vendor tools and compares them against an expected-version manifest:
//! - Topology discovery over `lspci` and `nvflash_mfg` (see [`platform`])
//! - A closed catalog of firmware probes (see [`probes`])
//! - The validation engine with its result log and audit outputs (see [`engine`])
//! - Manifest and staged-action loading (see [`config`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use utester_fwcheck::engine::OutputSink;
//! use utester_fwcheck::platform::{LspciInventory, SystemRunner};
//! use utester_fwcheck::probes::ProbeCatalog;
//! use utester_fwcheck::{run_fw_check, RunConfig, TesterType};
//!
//! let runner = Arc::new(SystemRunner::new());
//! let inventory = LspciInventory::new(runner.clone());
//! let catalog = ProbeCatalog::system(runner).expect("complete catalog");
//! let config = RunConfig::new(TesterType::Redstone);
//! let sink = OutputSink::prepare(&config.log_dir).expect("log dir");
//!
//! match run_fw_check(&config, &inventory, &catalog, sink) {
//!     Ok(summary) => println!("{} checks passed", summary.passed),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod platform;
pub mod probes;
pub mod version;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use cli::args::Args;
use config::StagedAction;
use engine::{OutputSink, RunSummary, ValidationEngine};
use platform::HardwareInventory;
use probes::{ProbeCatalog, ProbeError};

// Re-exports for public API
pub use engine::result::{CheckFailure, CheckOutcome, CheckRequest, CheckResult};
pub use engine::topology::{SwitchTier, TesterType};

/// Default location of the expected-version manifest.
pub const DEFAULT_MANIFEST_PATH: &str = "./ConfigFiles/UniversalTesterFirmwareConfig.json";

/// Default location of the static check declarations.
pub const DEFAULT_STAGED_ACTIONS_PATH: &str = "./staged_actions.json";

/// Default directory for run outputs.
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Error types for utester-fwcheck operations.
///
/// Per-check problems (a probe that cannot run, a version that does not
/// match) never surface here; they are recorded as
/// [`CheckFailure`] entries in the result log. What remains are the
/// conditions that stop a run.
#[derive(Debug, Error)]
pub enum FwCheckError {
    /// Invalid tester type, malformed manifest, incomplete probe catalog
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Discovered hardware does not fit the tester type
    #[error("topology inconsistency: {0}")]
    TopologyInconsistency(String),

    /// A command needed to discover the rig could not be run or parsed
    #[error("probe invocation failed: {0}")]
    ProbeInvocation(#[from] ProbeError),

    /// Terminal signal: the run finished and recorded failures
    #[error("found {failures} setup check fails")]
    SetupCheckFailed { failures: usize },

    /// I/O error
    #[error("I/O error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error
    #[error("JSON error in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FwCheckError {
    /// Process exit code for this error.
    ///
    /// 1 = setup checks failed, 2 = topology inconsistency,
    /// 3 = configuration, discovery or I/O error.
    pub fn exit_code(&self) -> u8 {
        match self {
            FwCheckError::SetupCheckFailed { .. } => 1,
            FwCheckError::TopologyInconsistency(_) => 2,
            _ => 3,
        }
    }
}

/// Configuration for one firmware check run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub tester_type: TesterType,
    /// Expected-version manifest (JSON)
    pub manifest_path: PathBuf,
    /// Static check declarations (JSON array)
    pub staged_actions_path: PathBuf,
    /// Directory receiving output.json, setup_check_info.json and trace logs
    pub log_dir: PathBuf,
}

impl RunConfig {
    /// Configuration with the default file locations.
    pub fn new(tester_type: TesterType) -> Self {
        RunConfig {
            tester_type,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            staged_actions_path: PathBuf::from(DEFAULT_STAGED_ACTIONS_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }

    /// Create configuration from command line arguments
    pub fn from_args(args: &Args) -> Result<Self, FwCheckError> {
        let name = args.tester_type.as_deref().ok_or_else(|| {
            FwCheckError::Configuration(
                "expected to specify and only specify the tester type".to_string(),
            )
        })?;

        Ok(RunConfig {
            tester_type: name.parse()?,
            manifest_path: args.config.clone(),
            staged_actions_path: args.staged_actions.clone(),
            log_dir: args.log_dir.clone(),
        })
    }
}

/// Run one complete firmware check pass.
///
/// Loads the manifest and the staged actions, constructs the engine (which
/// discovers and validates the topology), then issues the static checks,
/// the adaptive switch checks and, for tester types with removable interposer
/// ROMs, the adaptive ROM checks. Results are persisted to `sink` on every
/// path once the engine exists.
///
/// Returns [`FwCheckError::SetupCheckFailed`] when any check failed.
pub fn run_fw_check(
    config: &RunConfig,
    inventory: &dyn HardwareInventory,
    catalog: &ProbeCatalog,
    sink: OutputSink,
) -> Result<RunSummary, FwCheckError> {
    let manifest = config::load_manifest(&config.manifest_path)?;
    let staged = config::load_staged_actions(&config.staged_actions_path)?;

    for action in &staged {
        if let Err(e) = action.probe_id() {
            warn!(check = %action.name, "staged action will fail: {}", e);
        }
    }
    let requests = staged
        .into_iter()
        .map(StagedAction::into_request)
        .collect::<Result<Vec<_>, _>>()?;

    let engine = ValidationEngine::new(config.tester_type, inventory, catalog, sink)?;

    engine.run(|engine| {
        info!("running {} static checks", requests.len());
        for request in requests {
            engine.record_check(request);
        }

        engine.run_adaptive_switch_checks(&manifest.switches);

        if engine.tester_type().has_interposer_roms() {
            engine.run_adaptive_rom_checks(&manifest.spi_rom)?;
        }

        Ok(())
    })
}
