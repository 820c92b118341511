//! Tester types, topology snapshot and switch checklist derivation.
//!
//! The topology is discovered once when the engine is constructed and never
//! changes afterwards. Every count-based rule lives here:
//! - accelerators must come in whole boards
//! - bridges must match the board count exactly
//! - the board (DUT) count selects which PCIe switch tiers exist

use crate::platform::ModuleAddresses;
use crate::FwCheckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest number of DUT boards a tester chassis holds.
pub const MAX_DUTS: usize = 4;

/// Tester chassis variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TesterType {
    /// 4 GPUs per board, no NVSwitch bridges, removable interposer SPI ROMs
    Redstone,
    /// 8 GPUs and 6 NVSwitch bridges per board
    Delta,
}

impl TesterType {
    pub const ALL: [TesterType; 2] = [TesterType::Redstone, TesterType::Delta];

    pub fn name(self) -> &'static str {
        match self {
            TesterType::Redstone => "Redstone",
            TesterType::Delta => "Delta",
        }
    }

    pub fn gpus_per_board(self) -> usize {
        match self {
            TesterType::Redstone => 4,
            TesterType::Delta => 8,
        }
    }

    pub fn bridges_per_board(self) -> usize {
        match self {
            TesterType::Redstone => 0,
            TesterType::Delta => 6,
        }
    }

    /// Whether the boards carry interposer SPI ROMs reachable through nvflash.
    pub fn has_interposer_roms(self) -> bool {
        matches!(self, TesterType::Redstone)
    }
}

impl fmt::Display for TesterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TesterType {
    type Err = FwCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TesterType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                FwCheckError::Configuration(format!(
                    "please specify a valid tester type: [Delta, Redstone], got '{}'",
                    s
                ))
            })
    }
}

/// PCIe switch tier, in checklist order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchTier {
    TesterSideSwitches,
    LowerBoardSideSwitches,
    UpperBoardSideSwitches,
}

impl SwitchTier {
    pub const ALL: [SwitchTier; 3] = [
        SwitchTier::TesterSideSwitches,
        SwitchTier::LowerBoardSideSwitches,
        SwitchTier::UpperBoardSideSwitches,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SwitchTier::TesterSideSwitches => "TesterSideSwitches",
            SwitchTier::LowerBoardSideSwitches => "LowerBoardSideSwitches",
            SwitchTier::UpperBoardSideSwitches => "UpperBoardSideSwitches",
        }
    }
}

impl fmt::Display for SwitchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Switch tiers present for a given number of DUT boards.
///
/// A single board has no upper-board switches; two to four boards populate
/// all three tiers. Anything else means the rig is not fit for a run.
pub fn switch_checklist(num_duts: usize) -> Result<Vec<SwitchTier>, FwCheckError> {
    match num_duts {
        1 => Ok(vec![
            SwitchTier::TesterSideSwitches,
            SwitchTier::LowerBoardSideSwitches,
        ]),
        2..=MAX_DUTS => Ok(SwitchTier::ALL.to_vec()),
        n => Err(FwCheckError::TopologyInconsistency(format!(
            "number of DUTs must be in the range of 1-{}, but derived {}",
            MAX_DUTS, n
        ))),
    }
}

/// Accelerator and bridge layout discovered at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologySnapshot {
    pub tester_type: TesterType,
    pub accelerators: Vec<String>,
    pub bridges: Vec<String>,
    num_duts: usize,
}

impl TopologySnapshot {
    /// Validate discovered modules against the tester type's fixed ratios.
    pub fn from_modules(
        tester_type: TesterType,
        modules: ModuleAddresses,
    ) -> Result<Self, FwCheckError> {
        let gpus_per_board = tester_type.gpus_per_board();
        let bridges_per_board = tester_type.bridges_per_board();
        let num_gpus = modules.accelerators.len();
        let num_bridges = modules.bridges.len();

        if num_gpus % gpus_per_board != 0 {
            return Err(FwCheckError::TopologyInconsistency(format!(
                "number of GPUs must be multiple of {} for tester type {}, but found {} instead",
                gpus_per_board, tester_type, num_gpus
            )));
        }

        let num_duts = num_gpus / gpus_per_board;

        if num_bridges != bridges_per_board * num_duts {
            return Err(FwCheckError::TopologyInconsistency(format!(
                "number of bridges must be {} ({} per board) for {} DUTs, but found {} instead",
                bridges_per_board * num_duts,
                bridges_per_board,
                num_duts,
                num_bridges
            )));
        }

        Ok(TopologySnapshot {
            tester_type,
            accelerators: modules.accelerators,
            bridges: modules.bridges,
            num_duts,
        })
    }

    pub fn num_accelerators(&self) -> usize {
        self.accelerators.len()
    }

    pub fn num_bridges(&self) -> usize {
        self.bridges.len()
    }

    pub fn num_duts(&self) -> usize {
        self.num_duts
    }

    /// Two interposer ROMs sit on every DUT board.
    pub fn expected_rom_count(&self) -> usize {
        2 * self.num_duts
    }
}
