//! utester-fwcheck CLI entry point
//!
//! Firmware setup verification for multi-board GPU tester rigs.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

use utester_fwcheck::cli::args::Args;
use utester_fwcheck::cli::logging::init_logging;
use utester_fwcheck::cli::output::TerminalFormatter;
use utester_fwcheck::config::load_results;
use utester_fwcheck::engine::OutputSink;
use utester_fwcheck::platform::{CommandRunner, LspciInventory, SystemRunner};
use utester_fwcheck::probes::{ProbeCatalog, ProbeId};
use utester_fwcheck::version::get_build_info;
use utester_fwcheck::{run_fw_check, FwCheckError, RunConfig};

fn main() -> ExitCode {
    let args = Args::parse();

    if args.version {
        println!("{}", get_build_info());
        return ExitCode::SUCCESS;
    }

    if args.list_probes {
        print_probe_list();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn print_probe_list() {
    println!("Available probes:");
    println!();
    for id in ProbeId::ALL {
        let params = if id.params().is_empty() {
            "-".to_string()
        } else {
            id.params().join(", ")
        };
        println!("  {:<14} {:<8} {}", id.name(), params, id.description());
    }
}

fn run(args: &Args) -> Result<(), FwCheckError> {
    let config = RunConfig::from_args(args)?;
    let sink = OutputSink::prepare(&config.log_dir)?;
    init_logging(&sink.run_log_path(), args.console_level(), args.color_enabled())?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let inventory = LspciInventory::new(Arc::clone(&runner));
    let catalog = ProbeCatalog::system(runner)?;

    sink.clear_previous()?;
    let results_path = sink.results_path();
    let outcome = run_fw_check(&config, &inventory, &catalog, sink);

    // Absent when the run stopped before the engine existed
    if results_path.exists() {
        match load_results(&results_path) {
            Ok(results) => {
                let formatter =
                    TerminalFormatter::new(args.color_enabled(), args.verbose, args.quiet);
                println!(
                    "{}",
                    formatter.format(config.tester_type.name(), &results, outcome.as_ref().err())
                );
            }
            Err(e) => error!("could not read back results: {}", e),
        }
    }

    if let Err(ref e) = outcome {
        error!("{}", e);
    }
    outcome.map(|_| ())
}
