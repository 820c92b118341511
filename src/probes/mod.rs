//! Firmware probe catalog.
//!
//! A probe reads one firmware version string from the rig. The set of probes
//! is closed: [`ProbeId`] names every one of them, and a [`ProbeCatalog`]
//! maps each identifier to a function value. A catalog that lacks an entry
//! for any identifier is rejected when it is built, so dispatch at check time
//! only fails for names that are not probes at all.

pub mod firmware;

use crate::platform::CommandRunner;
use crate::FwCheckError;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Keyword parameters passed to a probe, in declared order.
pub type ProbeArgs = IndexMap<String, String>;

/// A probe implementation.
pub type ProbeFn = Box<dyn Fn(&ProbeArgs) -> Result<String, ProbeError>>;

/// Errors raised while invoking a probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The name does not identify any probe
    #[error("unknown probe '{0}'")]
    UnknownProbe(String),

    /// A command could not be run or exited with failure
    #[error("command '{command}' failed: {message}")]
    Command { command: String, message: String },

    /// A required parameter was not supplied
    #[error("missing argument '{0}'")]
    MissingArg(String),

    /// A parameter was supplied with an unusable value
    #[error("invalid value '{value}' for argument '{name}'")]
    InvalidArg { name: String, value: String },

    /// A parameter the probe does not take was supplied
    #[error("unexpected argument '{0}'")]
    UnexpectedArg(String),

    /// Tool output did not have the expected shape
    #[error("could not parse {context}: {message}")]
    Parse { context: String, message: String },
}

/// Every firmware probe the harness knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeId {
    Bmc,
    Sbios,
    MbFpga,
    MidFpga,
    Psu,
    Plx,
    Os,
    HostName,
    Spi,
}

impl ProbeId {
    pub const ALL: [ProbeId; 9] = [
        ProbeId::Bmc,
        ProbeId::Sbios,
        ProbeId::MbFpga,
        ProbeId::MidFpga,
        ProbeId::Psu,
        ProbeId::Plx,
        ProbeId::Os,
        ProbeId::HostName,
        ProbeId::Spi,
    ];

    /// Name used in staged actions and in the result log.
    pub fn name(self) -> &'static str {
        match self {
            ProbeId::Bmc => "checkBMC",
            ProbeId::Sbios => "checkSBIOS",
            ProbeId::MbFpga => "checkMBFPGA",
            ProbeId::MidFpga => "checkMIDFPGA",
            ProbeId::Psu => "checkPSU",
            ProbeId::Plx => "checkPLX",
            ProbeId::Os => "checkOS",
            ProbeId::HostName => "checkHostName",
            ProbeId::Spi => "checkSPI",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ProbeId::Bmc => "Primary and secondary BMC versions",
            ProbeId::Sbios => "Primary and secondary SBIOS versions",
            ProbeId::MbFpga => "Main board FPGA version",
            ProbeId::MidFpga => "Middle board FPGA version",
            ProbeId::Psu => "PSU firmware versions",
            ProbeId::Plx => "PCIe switch firmware version by bus address",
            ProbeId::Os => "Diag OS release version",
            ProbeId::HostName => "Tester hostname",
            ProbeId::Spi => "Interposer SPI ROM version by nvflash index",
        }
    }

    /// Parameters the probe accepts.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            ProbeId::Bmc | ProbeId::Sbios | ProbeId::Psu => &["pos"],
            ProbeId::Plx => &["dev_bus"],
            ProbeId::Spi => &["index"],
            ProbeId::MbFpga | ProbeId::MidFpga | ProbeId::Os | ProbeId::HostName => &[],
        }
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProbeId {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProbeId::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ProbeError::UnknownProbe(s.to_string()))
    }
}

/// Mapping from every [`ProbeId`] to its implementation.
pub struct ProbeCatalog {
    probes: HashMap<ProbeId, ProbeFn>,
}

impl ProbeCatalog {
    /// Build a catalog; every identifier must be covered.
    pub fn new(entries: Vec<(ProbeId, ProbeFn)>) -> Result<Self, FwCheckError> {
        let probes: HashMap<ProbeId, ProbeFn> = entries.into_iter().collect();

        let missing: Vec<&str> = ProbeId::ALL
            .iter()
            .filter(|id| !probes.contains_key(id))
            .map(|id| id.name())
            .collect();

        if !missing.is_empty() {
            return Err(FwCheckError::Configuration(format!(
                "probe catalog is missing: {}",
                missing.join(", ")
            )));
        }

        Ok(ProbeCatalog { probes })
    }

    /// Catalog of the real probes, shelling out through `runner`.
    pub fn system(runner: Arc<dyn CommandRunner>) -> Result<Self, FwCheckError> {
        Self::new(firmware::system_probes(runner))
    }

    /// Replace the implementation of one probe.
    pub fn with_probe(mut self, id: ProbeId, probe: ProbeFn) -> Self {
        self.probes.insert(id, probe);
        self
    }

    /// Look up a probe by its declared name and run it.
    pub fn invoke(&self, name: &str, args: &ProbeArgs) -> Result<String, ProbeError> {
        let id: ProbeId = name.parse()?;
        let probe = self
            .probes
            .get(&id)
            .ok_or_else(|| ProbeError::UnknownProbe(name.to_string()))?;
        probe(args)
    }
}

impl fmt::Debug for ProbeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&ProbeId> = self.probes.keys().collect();
        ids.sort();
        f.debug_struct("ProbeCatalog").field("probes", &ids).finish()
    }
}
