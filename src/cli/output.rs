//! Terminal report of a finished run.
//!
//! # Graceful Degradation
//!
//! - Color disabled via `--no-color` or `NO_COLOR`
//! - Empty result logs: Produces a valid report with zero checks
//! - Missing read versions: Shown as `-`
//! - Aborted runs: The abort reason and its exit code replace the summary verdict
//!
//! No function in this module will panic.

use crate::engine::result::{CheckOutcome, CheckResult, RunSummary};
use crate::FwCheckError;

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Human-readable formatter for a result log
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.colorize(text, "32")
    }

    fn red(&self, text: &str) -> String {
        self.colorize(text, "31")
    }

    /// Render `results`. `error` is the run's terminal error, if any; it
    /// decides the reported exit code.
    pub fn format(
        &self,
        tester_type: &str,
        results: &[CheckResult],
        error: Option<&FwCheckError>,
    ) -> String {
        let mut output = String::new();

        output.push_str(RULE);
        output.push('\n');
        output.push_str("utester-fwcheck firmware setup report\n");
        output.push_str(&format!("Tester type: {}\n", tester_type));
        output.push_str(RULE);
        output.push_str("\n\n");

        for result in results {
            match &result.outcome {
                CheckOutcome::Pass => {
                    if self.quiet {
                        continue;
                    }
                    let mut line = format!("  {} {}", self.green("[PASS]"), result.name);
                    if self.verbose {
                        line.push_str(&format!(" ({})", result.expected_version));
                    }
                    output.push_str(&line);
                }
                CheckOutcome::Fail { error } => {
                    output.push_str(&format!("  {} {}: {}", self.red("[FAIL]"), result.name, error));
                    if self.verbose {
                        output.push_str(&format!(
                            " [probe {}, read {}]",
                            result.probe,
                            result.read_version.as_deref().unwrap_or("-")
                        ));
                    }
                }
            }
            output.push('\n');
        }

        let summary = RunSummary::from_results(results);
        output.push('\n');
        output.push_str(RULE);
        output.push('\n');
        output.push_str(&format!(
            "SUMMARY: {} passed, {} failed, {} total\n",
            summary.passed, summary.failed, summary.total
        ));

        let (exit_code, exit_desc) = match error {
            Some(FwCheckError::SetupCheckFailed { .. }) => (1, "failures detected".to_string()),
            Some(e) => {
                output.push_str(&format!("{} {}\n", self.red("ABORTED:"), e));
                (e.exit_code(), "run aborted".to_string())
            }
            None if summary.failed > 0 => (1, "failures detected".to_string()),
            None => (0, "all checks passed".to_string()),
        };
        output.push_str(&format!("Exit code: {} ({})\n", exit_code, exit_desc));
        output.push_str(RULE);

        output
    }
}
