//! Platform interface layer.
//!
//! Provides consistent interfaces for:
//! - Running vendor and system commands (`command`)
//! - PCI topology discovery and interposer ROM enumeration (`pci`)

pub mod command;
pub mod pci;

pub use command::{CommandRunner, SystemRunner};
pub use pci::{
    parse_link_status, parse_nv_modules, parse_rom_list, HardwareInventory, LinkStatus,
    LspciInventory, ModuleAddresses, RomSlot,
};
