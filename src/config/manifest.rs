//! Expected-version manifest.

use crate::engine::topology::SwitchTier;
use indexmap::IndexMap;
use serde::Deserialize;

/// Switch tier → switch name → expected entry, in file order.
pub type SwitchManifest = IndexMap<SwitchTier, IndexMap<String, SwitchEntry>>;

/// Expected PCIe switch firmware and where to read it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwitchEntry {
    pub version: String,
    /// PCI address, `bus:dev.fn`
    pub addr: String,
}

/// Expected firmware versions for the adaptive checks.
///
/// Unrecognized top-level keys are ignored; unknown tier names are not.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FirmwareManifest {
    #[serde(rename = "PLX")]
    pub switches: SwitchManifest,
    /// One version for every interposer SPI ROM
    #[serde(rename = "SPI_rom")]
    pub spi_rom: String,
}
