//! Command line arguments.
//!
//! One positional tester type plus options for file locations and console
//! output.

use crate::{DEFAULT_LOG_DIR, DEFAULT_MANIFEST_PATH, DEFAULT_STAGED_ACTIONS_PATH};
use clap::Parser;
use std::env;
use std::path::PathBuf;

/// Verify tester firmware versions against the expected-version manifest
#[derive(Debug, Clone, Parser)]
#[command(name = "utester-fwcheck", disable_version_flag = true)]
pub struct Args {
    /// Tester type: Redstone or Delta
    #[arg(required_unless_present_any = ["list_probes", "version"])]
    pub tester_type: Option<String>,

    /// Expected-version manifest
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MANIFEST_PATH)]
    pub config: PathBuf,

    /// Static check declarations
    #[arg(long, value_name = "FILE", default_value = DEFAULT_STAGED_ACTIONS_PATH)]
    pub staged_actions: PathBuf,

    /// Directory for results, snapshot and probe traces
    #[arg(long, value_name = "DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Only print warnings and failures to the console
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Include trace-level diagnostics on the console
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// List all available probes and exit
    #[arg(long)]
    pub list_probes: bool,

    /// Print version information and exit
    #[arg(short = 'V', long)]
    pub version: bool,
}

impl Args {
    /// Console log filter directive.
    pub fn console_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "trace"
        } else {
            "debug"
        }
    }

    /// Color is on unless `--no-color`, `NO_COLOR`, or the `color` feature is off.
    pub fn color_enabled(&self) -> bool {
        cfg!(feature = "color") && !self.no_color && env::var_os("NO_COLOR").is_none()
    }
}
