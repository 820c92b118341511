//! Mock platform implementations for testing.
//!
//! Provides:
//! - `ScriptedRunner`: a `CommandRunner` answering from a table of canned outputs
//! - `MockRig`: a tester rig description that renders the tool output a real
//!   rig would produce

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use utester_fwcheck::platform::{CommandRunner, LspciInventory};
use utester_fwcheck::probes::{ProbeCatalog, ProbeError};
use utester_fwcheck::TesterType;

/// Command runner answering from canned outputs
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: RefCell<HashMap<String, Result<String, String>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        ScriptedRunner::default()
    }

    /// Answer `command` with `stdout`.
    pub fn respond(&self, command: impl Into<String>, stdout: impl Into<String>) {
        self.outputs
            .borrow_mut()
            .insert(command.into(), Ok(stdout.into()));
    }

    /// Make `command` fail as if it exited non-zero.
    pub fn fail(&self, command: impl Into<String>, message: impl Into<String>) {
        self.outputs
            .borrow_mut()
            .insert(command.into(), Err(message.into()));
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == command).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<String, ProbeError> {
        self.calls.borrow_mut().push(command.to_string());
        match self.outputs.borrow().get(command) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(message)) => Err(ProbeError::Command {
                command: command.to_string(),
                message: message.clone(),
            }),
            None => Err(ProbeError::Command {
                command: command.to_string(),
                message: "sh: command not found".to_string(),
            }),
        }
    }
}

pub const LSPCI: &str = "lspci";
pub const NVFLASH_LIST: &str = "./utils/nvflash_mfg --list";

pub fn plx_command(dev_bus: &str) -> String {
    format!(
        "./utils/pcimem /sys/bus/pci/devices/0000:{}/resource0 0x29D b 2>/dev/null",
        dev_bus
    )
}

pub fn spi_command(index: &str) -> String {
    format!("./utils/nvflash_mfg -v -i {}", index)
}

/// pcimem output whose last byte reads back as `version` (`"3.4"` → `0x34`).
pub fn pcimem_output(dev_bus: &str, version: &str) -> String {
    let digits: String = version.chars().filter(|c| *c != '.').collect();
    format!(
        "/sys/bus/pci/devices/0000:{}/resource0 opened.\n\
         Target offset is 0x29d, page size is 4096\n\
         Value at offset 0x29D (0x7f3c1a2b629d): 0x{}\n",
        dev_bus, digits
    )
}

pub fn nvflash_version_output(version: &str) -> String {
    format!(
        "NVIDIA Firmware Update Utility (Version 5.590.0)\n\
         Version               : {}\n\
         Board ID              : 0x0100\n",
        version
    )
}

/// Mock tester rig configuration
#[derive(Debug, Clone)]
pub struct MockRig {
    pub tester_type: TesterType,
    pub gpus: usize,
    pub bridges: usize,
    /// `(nvflash index, bus)` of each interposer ROM
    pub roms: Vec<(String, String)>,
}

impl MockRig {
    /// Redstone rig with `duts` boards and two ROMs per board
    pub fn redstone(duts: usize) -> Self {
        MockRig {
            tester_type: TesterType::Redstone,
            gpus: 4 * duts,
            bridges: 0,
            roms: (0..2 * duts)
                .map(|i| (i.to_string(), format!("{:02X}", 0x1A + 0x20 * i)))
                .collect(),
        }
    }

    /// Delta rig with `duts` boards
    pub fn delta(duts: usize) -> Self {
        MockRig {
            tester_type: TesterType::Delta,
            gpus: 8 * duts,
            bridges: 6 * duts,
            roms: Vec::new(),
        }
    }

    pub fn accelerator_addr(i: usize) -> String {
        format!("{:02x}:00.0", 0x10 + i)
    }

    pub fn bridge_addr(i: usize) -> String {
        format!("{:02x}:00.0", 0x80 + i)
    }

    pub fn lspci_output(&self) -> String {
        let mut out = String::from("00:00.0 Host bridge: Intel Corporation Device 09a2 (rev 04)\n");
        for i in 0..self.gpus {
            out.push_str(&format!(
                "{} 3D controller: NVIDIA Corporation Device 20b0 (rev a1)\n",
                Self::accelerator_addr(i)
            ));
        }
        for i in 0..self.bridges {
            out.push_str(&format!(
                "{} Bridge: NVIDIA Corporation Device 1af1 (rev a1)\n",
                Self::bridge_addr(i)
            ));
        }
        out.push_str("c1:00.0 Ethernet controller: Mellanox Technologies MT28908 Family\n");
        out
    }

    pub fn nvflash_list_output(&self) -> String {
        let mut out = String::from("NVIDIA Firmware Update Utility (Version 5.590.0)\n");
        for (index, bus) in &self.roms {
            out.push_str(&format!(
                "<{}> PEX88096 (10B5,C010,10B5,C010) S:00,B:{},D:00,F:00\n",
                index, bus
            ));
        }
        out
    }

    /// Runner answering topology discovery and ROM enumeration.
    pub fn runner(&self) -> Arc<ScriptedRunner> {
        let runner = ScriptedRunner::new();
        runner.respond(LSPCI, self.lspci_output());
        runner.respond(NVFLASH_LIST, self.nvflash_list_output());
        Arc::new(runner)
    }
}

/// Real inventory and catalog over a scripted runner.
pub fn system_fixtures(runner: &Arc<ScriptedRunner>) -> (LspciInventory, ProbeCatalog) {
    let dyn_runner: Arc<dyn CommandRunner> = runner.clone();
    let inventory = LspciInventory::new(Arc::clone(&dyn_runner));
    let catalog = ProbeCatalog::system(dyn_runner).expect("system catalog is complete");
    (inventory, catalog)
}
