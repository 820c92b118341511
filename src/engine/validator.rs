//! Validation engine.
//!
//! Owns one run: the topology discovered at construction, the switch
//! checklist derived from it, and the result log that every check appends
//! to. Construction fails fast on an inconsistent rig; after that, individual
//! probe failures are recorded and never stop the run. Only a wrong ROM
//! count aborts the remaining checks.
//!
//! [`ValidationEngine::run`] guarantees teardown: the result log and the
//! engine snapshot are written whatever the run body returns.

use crate::config::SwitchManifest;
use crate::engine::result::{
    compare_versions, CheckFailure, CheckOutcome, CheckRequest, CheckResult, ResultLog,
    RunSummary,
};
use crate::engine::sink::OutputSink;
use crate::engine::topology::{switch_checklist, SwitchTier, TesterType, TopologySnapshot};
use crate::platform::{HardwareInventory, LinkStatus, RomSlot};
use crate::probes::{ProbeCatalog, ProbeError, ProbeId};
use crate::FwCheckError;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Negotiated link of one accelerator, if it could be read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorLink {
    pub address: String,
    pub link: Option<LinkStatus>,
}

/// Engine state persisted for audit at teardown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub tester_type: TesterType,
    pub gpus_per_board: usize,
    pub bridges_per_board: usize,
    pub accelerators: Vec<String>,
    pub bridges: Vec<String>,
    pub num_accelerators: usize,
    pub num_bridges: usize,
    pub num_duts: usize,
    pub switch_checklist: Vec<SwitchTier>,
    pub accelerator_links: Vec<AcceleratorLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interposer_roms: Option<Vec<RomSlot>>,
    pub log_dir: PathBuf,
    pub summary: RunSummary,
}

pub struct ValidationEngine<'a> {
    topology: TopologySnapshot,
    switch_checklist: Vec<SwitchTier>,
    links: Vec<AcceleratorLink>,
    interposer_roms: Option<Vec<RomSlot>>,
    inventory: &'a dyn HardwareInventory,
    catalog: &'a ProbeCatalog,
    sink: OutputSink,
    log: ResultLog,
}

impl<'a> ValidationEngine<'a> {
    /// Discover the topology and derive the checklist.
    ///
    /// Fails with [`FwCheckError::ProbeInvocation`] when the rig cannot be
    /// enumerated and [`FwCheckError::TopologyInconsistency`] when the counts
    /// do not fit `tester_type`. No checks run in either case.
    pub fn new(
        tester_type: TesterType,
        inventory: &'a dyn HardwareInventory,
        catalog: &'a ProbeCatalog,
        sink: OutputSink,
    ) -> Result<Self, FwCheckError> {
        let modules = inventory.discover_modules()?;
        let topology = TopologySnapshot::from_modules(tester_type, modules)?;
        let switch_checklist = switch_checklist(topology.num_duts())?;

        info!(
            tester_type = %tester_type,
            gpus = topology.num_accelerators(),
            bridges = topology.num_bridges(),
            duts = topology.num_duts(),
            "topology discovered"
        );

        let links = topology
            .accelerators
            .iter()
            .map(|addr| {
                let link = match inventory.read_link_status(addr) {
                    Ok(link) => Some(link),
                    Err(e) => {
                        debug!(address = %addr, "link status unavailable: {}", e);
                        None
                    }
                };
                AcceleratorLink {
                    address: addr.clone(),
                    link,
                }
            })
            .collect();

        Ok(ValidationEngine {
            topology,
            switch_checklist,
            links,
            interposer_roms: None,
            inventory,
            catalog,
            sink,
            log: ResultLog::new(),
        })
    }

    pub fn tester_type(&self) -> TesterType {
        self.topology.tester_type
    }

    pub fn topology(&self) -> &TopologySnapshot {
        &self.topology
    }

    pub fn switch_checklist(&self) -> &[SwitchTier] {
        &self.switch_checklist
    }

    pub fn results(&self) -> &ResultLog {
        &self.log
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Run one probe, compare against the expected version and record it.
    ///
    /// Always appends exactly one entry. Probe failures write a diagnostic
    /// trace to the sink and are recorded as
    /// [`CheckFailure::ProbeInvocation`].
    pub fn record_check(&mut self, request: CheckRequest) -> &CheckResult {
        info!("checking {}...", request.name);
        if !request.args.is_empty() {
            debug!("additional argument is {:?}", request.args);
        }

        let (read_version, outcome) = match self.catalog.invoke(&request.probe, &request.args) {
            Ok(read) => {
                info!("read version is {}", read);
                info!("expected version is {}", request.expected_version);
                let outcome = compare_versions(&request.expected_version, &read);
                (Some(read), outcome)
            }
            Err(e) => {
                error!(
                    "calling the probe {} with argument {:?} failed: {}",
                    request.probe, request.args, e
                );
                self.persist_trace(&request, &e);
                let outcome = CheckOutcome::Fail {
                    error: CheckFailure::ProbeInvocation {
                        message: e.to_string(),
                    },
                };
                (None, outcome)
            }
        };

        match &outcome {
            CheckOutcome::Pass => info!("the comparison passed"),
            CheckOutcome::Fail {
                error: CheckFailure::ComparisonMismatch { .. },
            } => warn!("the comparison failed"),
            CheckOutcome::Fail { .. } => {}
        }

        self.log.push(CheckResult {
            name: request.name,
            probe: request.probe,
            args: request.args,
            read_version,
            expected_version: request.expected_version,
            outcome,
        })
    }

    fn persist_trace(&self, request: &CheckRequest, err: &ProbeError) {
        let trace = format!(
            "probe: {}\ncheck: {}\nargs: {:?}\nerror: {}\n",
            request.probe, request.name, request.args, err
        );

        match self.sink.write_trace(&request.probe, &trace) {
            Ok(path) => error!("logging traceback to {}", path.display()),
            Err(e) => warn!("could not write probe trace: {}", e),
        }
    }

    /// Check every configured switch in the tiers the topology contains.
    ///
    /// Tiers outside the checklist are skipped even when configured.
    pub fn run_adaptive_switch_checks(&mut self, switches: &SwitchManifest) {
        info!("checking the PLX switches");

        let tiers = self.switch_checklist.clone();
        for tier in tiers {
            let Some(entries) = switches.get(&tier) else {
                warn!(tier = %tier, "no switches configured for an active tier");
                continue;
            };

            for (name, entry) in entries {
                let request = CheckRequest::new(
                    format!("PLX FW {}.{}", tier, name),
                    ProbeId::Plx.name(),
                    &entry.version,
                )
                .arg("dev_bus", &entry.addr);
                self.record_check(request);
            }
        }

        for tier in switches.keys() {
            if !self.switch_checklist.contains(tier) {
                debug!(tier = %tier, duts = self.topology.num_duts(), "tier skipped for topology");
            }
        }
    }

    /// Check every interposer SPI ROM against one expected version.
    ///
    /// The rig must expose exactly two ROMs per DUT; any other count is a
    /// [`FwCheckError::TopologyInconsistency`] and no ROM is checked.
    pub fn run_adaptive_rom_checks(&mut self, expected_version: &str) -> Result<(), FwCheckError> {
        let roms = self.inventory.list_interposer_roms()?;
        let expected = self.topology.expected_rom_count();
        self.interposer_roms = Some(roms.clone());

        if roms.len() != expected {
            return Err(FwCheckError::TopologyInconsistency(format!(
                "number of SPI roms should be {}, but only found {}",
                expected,
                roms.len()
            )));
        }

        info!("checking the Universal Interposer SPI ROM versions");
        for rom in roms {
            let request = CheckRequest::new(
                format!(
                    "universal interposer SPI ROM at nvflash index {} and topology address {}",
                    rom.index, rom.bus
                ),
                ProbeId::Spi.name(),
                expected_version,
            )
            .arg("index", rom.index);
            self.record_check(request);
        }

        Ok(())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let tester_type = self.topology.tester_type;
        EngineSnapshot {
            tester_type,
            gpus_per_board: tester_type.gpus_per_board(),
            bridges_per_board: tester_type.bridges_per_board(),
            accelerators: self.topology.accelerators.clone(),
            bridges: self.topology.bridges.clone(),
            num_accelerators: self.topology.num_accelerators(),
            num_bridges: self.topology.num_bridges(),
            num_duts: self.topology.num_duts(),
            switch_checklist: self.switch_checklist.clone(),
            accelerator_links: self.links.clone(),
            interposer_roms: self.interposer_roms.clone(),
            log_dir: self.sink.log_dir().to_path_buf(),
            summary: self.log.summary(),
        }
    }

    /// Teardown: persist results and snapshot, then report failures.
    ///
    /// Returns [`FwCheckError::SetupCheckFailed`] after both files are
    /// written when any check failed.
    pub fn finish(self) -> Result<RunSummary, FwCheckError> {
        info!("dumping test info");

        let results_path = self.sink.results_path();
        info!("dumping test results to {}", results_path.display());
        self.sink.write_json(&results_path, &self.log)?;

        let snapshot_path = self.sink.snapshot_path();
        info!("dumping setup check info to {}", snapshot_path.display());
        self.sink.write_json(&snapshot_path, &self.snapshot())?;

        let summary = self.log.summary();
        if summary.failed > 0 {
            return Err(FwCheckError::SetupCheckFailed {
                failures: summary.failed,
            });
        }

        info!("all {} setup checks passed", summary.total);
        Ok(summary)
    }

    /// Execute `body` against this engine, then always tear down.
    ///
    /// A fatal error from `body` takes precedence over the teardown outcome;
    /// the teardown result is logged in that case.
    pub fn run<F>(mut self, body: F) -> Result<RunSummary, FwCheckError>
    where
        F: FnOnce(&mut Self) -> Result<(), FwCheckError>,
    {
        let body_result = body(&mut self);
        let teardown = self.finish();

        match body_result {
            Ok(()) => teardown,
            Err(e) => {
                error!("run aborted: {}", e);
                match teardown {
                    Ok(summary) => info!("{} checks recorded before abort", summary.total),
                    Err(t) => warn!("teardown after abort: {}", t),
                }
                Err(e)
            }
        }
    }
}
