//! Validation engine integration tests.
//!
//! Topology derivation, the compare-and-record protocol, adaptive checks and
//! teardown, driven through the real `lspci` inventory and probe catalog over
//! scripted tool output.

use std::fs;

use indexmap::IndexMap;
use tempfile::TempDir;
use utester_fwcheck::config::{SwitchEntry, SwitchManifest};
use utester_fwcheck::engine::{OutputSink, ValidationEngine};
use utester_fwcheck::probes::{ProbeArgs, ProbeCatalog, ProbeId};
use utester_fwcheck::{
    CheckFailure, CheckOutcome, CheckRequest, FwCheckError, SwitchTier, TesterType,
};

use crate::mocks::*;

fn switch_manifest(entries: &[(SwitchTier, &str, &str, &str)]) -> SwitchManifest {
    let mut manifest = SwitchManifest::new();
    for (tier, name, version, addr) in entries {
        manifest
            .entry(*tier)
            .or_insert_with(IndexMap::new)
            .insert(
                name.to_string(),
                SwitchEntry {
                    version: version.to_string(),
                    addr: addr.to_string(),
                },
            );
    }
    manifest
}

// Construction

#[test]
fn test_scenario_a_single_redstone_board() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::redstone(1).runner();
    let (inventory, catalog) = system_fixtures(&runner);

    let engine = ValidationEngine::new(
        TesterType::Redstone,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    )
    .unwrap();

    assert_eq!(engine.topology().num_accelerators(), 4);
    assert_eq!(engine.topology().num_bridges(), 0);
    assert_eq!(engine.topology().num_duts(), 1);
    assert_eq!(
        engine.switch_checklist(),
        &[SwitchTier::TesterSideSwitches, SwitchTier::LowerBoardSideSwitches]
    );
    assert_eq!(engine.topology().expected_rom_count(), 2);
    assert!(engine.results().is_empty());
}

#[test]
fn test_delta_four_boards() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(4).runner();
    let (inventory, catalog) = system_fixtures(&runner);

    let engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    assert_eq!(engine.topology().num_duts(), 4);
    assert_eq!(engine.topology().num_bridges(), 24);
    assert_eq!(engine.switch_checklist().len(), 3);
}

#[test]
fn test_partial_board_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let mut rig = MockRig::redstone(1);
    rig.gpus = 6;
    let runner = rig.runner();
    let (inventory, catalog) = system_fixtures(&runner);

    let result = ValidationEngine::new(
        TesterType::Redstone,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    );
    assert!(matches!(result, Err(FwCheckError::TopologyInconsistency(_))));
}

#[test]
fn test_missing_bridge_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let mut rig = MockRig::delta(2);
    rig.bridges = 11;
    let runner = rig.runner();
    let (inventory, catalog) = system_fixtures(&runner);

    let result =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()));
    assert!(matches!(result, Err(FwCheckError::TopologyInconsistency(_))));
}

#[test]
fn test_wrong_tester_type_for_rig_is_fatal() {
    let tmp = TempDir::new().unwrap();
    // 8 GPUs and 6 bridges is one Delta board, but bridges never fit Redstone
    let runner = MockRig::delta(1).runner();
    let (inventory, catalog) = system_fixtures(&runner);

    let result = ValidationEngine::new(
        TesterType::Redstone,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    );
    assert!(matches!(result, Err(FwCheckError::TopologyInconsistency(_))));
}

#[test]
fn test_dut_count_out_of_range_is_fatal() {
    let tmp = TempDir::new().unwrap();
    for duts in [0, 5] {
        let runner = MockRig::redstone(duts).runner();
        let (inventory, catalog) = system_fixtures(&runner);
        let result = ValidationEngine::new(
            TesterType::Redstone,
            &inventory,
            &catalog,
            OutputSink::new(tmp.path()),
        );
        assert!(
            matches!(result, Err(FwCheckError::TopologyInconsistency(_))),
            "{} DUTs should be rejected",
            duts
        );
    }
}

#[test]
fn test_discovery_failure_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let runner = std::sync::Arc::new(ScriptedRunner::new());
    runner.fail(LSPCI, "exit status: 127");
    let (inventory, catalog) = system_fixtures(&runner);

    let result = ValidationEngine::new(
        TesterType::Delta,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    );
    assert!(matches!(result, Err(FwCheckError::ProbeInvocation(_))));
}

// record_check

#[test]
fn test_scenario_b_switch_pass_then_mismatch() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::redstone(2).runner();
    runner.respond(plx_command("3a:00.0"), pcimem_output("3a:00.0", "3.4"));
    runner.respond(plx_command("3b:00.0"), pcimem_output("3b:00.0", "3.5"));
    runner.respond(plx_command("3c:00.0"), pcimem_output("3c:00.0", "3.4"));
    let (inventory, catalog) = system_fixtures(&runner);

    let mut engine = ValidationEngine::new(
        TesterType::Redstone,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    )
    .unwrap();

    let manifest = switch_manifest(&[
        (SwitchTier::UpperBoardSideSwitches, "sw1", "3.4", "3a:00.0"),
        (SwitchTier::UpperBoardSideSwitches, "sw2", "3.4", "3b:00.0"),
        (SwitchTier::UpperBoardSideSwitches, "sw3", "3.4", "3c:00.0"),
    ]);
    engine.run_adaptive_switch_checks(&manifest);

    let log = engine.results().entries();
    assert_eq!(log.len(), 3);

    assert_eq!(log[0].name, "PLX FW UpperBoardSideSwitches.sw1");
    assert_eq!(log[0].outcome, CheckOutcome::Pass);
    assert_eq!(log[0].read_version.as_deref(), Some("3.4"));

    assert_eq!(
        log[1].outcome,
        CheckOutcome::Fail {
            error: CheckFailure::ComparisonMismatch {
                expected: "3.4".to_string(),
                read: "3.5".to_string(),
            }
        }
    );

    // The mismatch did not stop the run
    assert_eq!(log[2].outcome, CheckOutcome::Pass);
}

#[test]
fn test_record_check_is_total_for_unknown_probe() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    let result = engine
        .record_check(CheckRequest::new("GPU VBIOS", "checkVBIOS", "96.00").arg("index", "0"))
        .clone();

    assert_eq!(engine.results().len(), 1);
    assert_eq!(result.read_version, None);
    assert!(matches!(
        result.outcome,
        CheckOutcome::Fail {
            error: CheckFailure::ProbeInvocation { .. }
        }
    ));
    assert!(tmp.path().join("checkVBIOS_callfail.log").exists());
}

#[test]
fn test_probe_failure_writes_trace_and_continues() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    runner.fail("ipmitool raw 0x32 0x8f 0x09 0x01", "Unable to send RAW command");
    runner.respond("hostname", "utester-07\n");
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    engine.record_check(CheckRequest::new("Primary BMC", "checkBMC", "1.2.10").arg("pos", "0"));
    engine.record_check(CheckRequest::new("Hostname", "checkHostName", "utester-07"));

    let log = engine.results().entries();
    assert_eq!(log.len(), 2);
    assert!(log[0].outcome.is_fail());
    assert_eq!(log[1].outcome, CheckOutcome::Pass);

    let trace = fs::read_to_string(tmp.path().join("checkBMC_callfail.log")).unwrap();
    assert!(trace.contains("Primary BMC"));
    assert!(trace.contains("Unable to send RAW command"));
}

#[test]
fn test_record_check_is_not_deduplicated() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    runner.respond("hostname", "utester-07\n");
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    let request = CheckRequest::new("Hostname", "checkHostName", "utester-07");
    engine.record_check(request.clone());
    assert_eq!(engine.results().len(), 1);
    engine.record_check(request);
    assert_eq!(engine.results().len(), 2);

    let log = engine.results().entries();
    assert_eq!(log[0], log[1]);
}

#[test]
fn test_version_equality_is_literal() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    let (inventory, _) = system_fixtures(&runner);
    let catalog = ProbeCatalog::system(runner.clone())
        .unwrap()
        .with_probe(ProbeId::Os, Box::new(|_: &ProbeArgs| Ok("1.02.3".to_string())));
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    let result = engine.record_check(CheckRequest::new("Diag OS", "checkOS", "1.2.3"));
    assert!(result.outcome.is_fail());
}

// Adaptive checks

#[test]
fn test_switch_checks_follow_tier_then_config_order() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(2).runner();
    for bus in ["1a:00.0", "2a:00.0", "2b:00.0", "3a:00.0"] {
        runner.respond(plx_command(bus), pcimem_output(bus, "1.7"));
    }
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    // Declared out of tier order on purpose
    let manifest = switch_manifest(&[
        (SwitchTier::UpperBoardSideSwitches, "ub", "1.7", "3a:00.0"),
        (SwitchTier::LowerBoardSideSwitches, "lb_z", "1.7", "2b:00.0"),
        (SwitchTier::LowerBoardSideSwitches, "lb_a", "1.7", "2a:00.0"),
        (SwitchTier::TesterSideSwitches, "ts", "1.7", "1a:00.0"),
    ]);
    engine.run_adaptive_switch_checks(&manifest);

    let names: Vec<&str> = engine
        .results()
        .entries()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "PLX FW TesterSideSwitches.ts",
            "PLX FW LowerBoardSideSwitches.lb_z",
            "PLX FW LowerBoardSideSwitches.lb_a",
            "PLX FW UpperBoardSideSwitches.ub",
        ]
    );
    assert_eq!(engine.results().summary().failed, 0);
}

#[test]
fn test_upper_tier_ignored_with_one_board() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    runner.respond(plx_command("1a:00.0"), pcimem_output("1a:00.0", "1.7"));
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    let manifest = switch_manifest(&[
        (SwitchTier::TesterSideSwitches, "ts", "1.7", "1a:00.0"),
        (SwitchTier::UpperBoardSideSwitches, "ub", "1.7", "3a:00.0"),
    ]);
    engine.run_adaptive_switch_checks(&manifest);

    assert_eq!(engine.results().len(), 1);
    assert_eq!(runner.call_count(&plx_command("3a:00.0")), 0);
}

#[test]
fn test_rom_checks_pass() {
    let tmp = TempDir::new().unwrap();
    let rig = MockRig::redstone(2);
    let runner = rig.runner();
    for (index, _) in &rig.roms {
        runner.respond(spi_command(index), nvflash_version_output("96.00.5A.00.01"));
    }
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine = ValidationEngine::new(
        TesterType::Redstone,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    )
    .unwrap();

    engine.run_adaptive_rom_checks("96.00.5A.00.01").unwrap();

    let log = engine.results().entries();
    assert_eq!(log.len(), 4);
    assert!(log.iter().all(|r| r.outcome.is_pass()));
    assert_eq!(
        log[1].name,
        "universal interposer SPI ROM at nvflash index 1 and topology address 3A"
    );
}

#[test]
fn test_scenario_c_rom_count_mismatch() {
    let tmp = TempDir::new().unwrap();
    let mut rig = MockRig::redstone(2);
    rig.roms.truncate(3);
    let runner = rig.runner();
    runner.respond("hostname", "utester-07\n");
    let (inventory, catalog) = system_fixtures(&runner);
    let engine = ValidationEngine::new(
        TesterType::Redstone,
        &inventory,
        &catalog,
        OutputSink::new(tmp.path()),
    )
    .unwrap();

    let err = engine
        .run(|engine| {
            engine.record_check(CheckRequest::new("Hostname", "checkHostName", "utester-07"));
            engine.run_adaptive_rom_checks("96.00.5A.00.01")?;
            engine.record_check(CheckRequest::new("never", "checkHostName", "x"));
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, FwCheckError::TopologyInconsistency(_)));
    assert!(err.to_string().contains("should be 4"));
    assert_eq!(runner.call_count(&spi_command("0")), 0);

    // Teardown still ran with the entries recorded before the abort
    let persisted: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("output.json")).unwrap()).unwrap();
    let entries = persisted.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Hostname");
    assert!(tmp.path().join("setup_check_info.json").exists());
}

// Teardown

#[test]
fn test_scenario_d_all_pass() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    runner.respond("hostname", "utester-07\n");
    let (inventory, catalog) = system_fixtures(&runner);
    let engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    let summary = engine
        .run(|engine| {
            engine.record_check(CheckRequest::new("Hostname", "checkHostName", "utester-07"));
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.failed, 0);

    let persisted: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("output.json")).unwrap()).unwrap();
    assert_eq!(persisted[0]["result"], "Pass");
}

#[test]
fn test_failures_raise_after_outputs_written() {
    let tmp = TempDir::new().unwrap();
    let runner = MockRig::delta(1).runner();
    runner.respond("hostname", "utester-07\n");
    let (inventory, catalog) = system_fixtures(&runner);
    let mut engine =
        ValidationEngine::new(TesterType::Delta, &inventory, &catalog, OutputSink::new(tmp.path()))
            .unwrap();

    engine.record_check(CheckRequest::new("Hostname", "checkHostName", "utester-08"));
    engine.record_check(CheckRequest::new("Diag OS", "checkOS", "2.1.7"));
    engine.record_check(CheckRequest::new("Hostname again", "checkHostName", "utester-07"));

    let err = engine.finish().unwrap_err();
    assert!(matches!(err, FwCheckError::SetupCheckFailed { failures: 2 }));
    assert_eq!(err.exit_code(), 1);

    assert!(tmp.path().join("output.json").exists());
    let snapshot: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(tmp.path().join("setup_check_info.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot["tester_type"], "Delta");
    assert_eq!(snapshot["num_duts"], 1);
    assert_eq!(snapshot["summary"]["failed"], 2);
}
