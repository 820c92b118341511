//! PCI topology discovery.
//!
//! Finds NVIDIA accelerators and NVSwitch bridges in `lspci` output, lists
//! the interposer SPI ROMs visible to `nvflash_mfg`, and reads PCIe link
//! status for a single device.
//!
//! Parsing is kept in free functions so it can be exercised against
//! captured tool output.

use crate::platform::command::CommandRunner;
use crate::probes::ProbeError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

static ACCELERATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9a-f]{2}:00\.0) 3D controller: NVIDIA Corporation Device")
        .expect("accelerator pattern is valid")
});

static BRIDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9a-f]{2}:00\.0) Bridge: NVIDIA Corporation Device")
        .expect("bridge pattern is valid")
});

static ROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(\d+)> +PEX880.*B:([A-F0-9]+),").expect("rom pattern is valid")
});

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"LnkSta:\s+Speed ([\d.]+)GT/s(?: \([^)]*\))?, Width x(\d+)")
        .expect("link status pattern is valid")
});

/// Addresses of the pluggable modules, in `lspci` order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleAddresses {
    pub accelerators: Vec<String>,
    pub bridges: Vec<String>,
}

/// An interposer SPI ROM as enumerated by `nvflash_mfg --list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomSlot {
    /// nvflash device index
    pub index: String,
    /// PCI bus of the switch the ROM hangs off
    pub bus: String,
}

/// Negotiated PCIe link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStatus {
    pub speed_gts: String,
    pub width: u32,
}

/// Source of hardware topology information.
pub trait HardwareInventory {
    /// Enumerate accelerator and bridge addresses.
    fn discover_modules(&self) -> Result<ModuleAddresses, ProbeError>;

    /// Enumerate addressable interposer ROMs.
    fn list_interposer_roms(&self) -> Result<Vec<RomSlot>, ProbeError>;

    /// Read the negotiated link of one device.
    fn read_link_status(&self, addr: &str) -> Result<LinkStatus, ProbeError>;
}

/// [`HardwareInventory`] backed by `lspci` and `nvflash_mfg`.
pub struct LspciInventory {
    runner: Arc<dyn CommandRunner>,
}

impl LspciInventory {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        LspciInventory { runner }
    }
}

impl HardwareInventory for LspciInventory {
    fn discover_modules(&self) -> Result<ModuleAddresses, ProbeError> {
        let lspci = self.runner.run("lspci")?;
        Ok(parse_nv_modules(&lspci))
    }

    fn list_interposer_roms(&self) -> Result<Vec<RomSlot>, ProbeError> {
        let out = self.runner.run("./utils/nvflash_mfg --list")?;
        Ok(parse_rom_list(&out))
    }

    fn read_link_status(&self, addr: &str) -> Result<LinkStatus, ProbeError> {
        let out = self.runner.run(&format!("lspci -vvs {}", addr))?;
        parse_link_status(&out)
    }
}

/// Extract accelerator and bridge addresses from `lspci` output.
pub fn parse_nv_modules(lspci: &str) -> ModuleAddresses {
    let capture = |re: &Regex| -> Vec<String> {
        re.captures_iter(lspci)
            .map(|c| c[1].to_string())
            .collect()
    };

    ModuleAddresses {
        accelerators: capture(&ACCELERATOR_RE),
        bridges: capture(&BRIDGE_RE),
    }
}

/// Extract `(index, bus)` pairs from `nvflash_mfg --list` output.
pub fn parse_rom_list(out: &str) -> Vec<RomSlot> {
    out.lines()
        .filter_map(|line| ROM_RE.captures(line))
        .map(|c| RomSlot {
            index: c[1].to_string(),
            bus: c[2].to_string(),
        })
        .collect()
}

/// Extract the `LnkSta` speed and width from `lspci -vv` output.
pub fn parse_link_status(out: &str) -> Result<LinkStatus, ProbeError> {
    let caps = LINK_RE.captures(out).ok_or_else(|| ProbeError::Parse {
        context: "lspci link status".to_string(),
        message: "no LnkSta line found".to_string(),
    })?;

    let width = caps[2].parse().map_err(|_| ProbeError::Parse {
        context: "lspci link status".to_string(),
        message: format!("invalid link width '{}'", &caps[2]),
    })?;

    Ok(LinkStatus {
        speed_gts: caps[1].to_string(),
        width,
    })
}
