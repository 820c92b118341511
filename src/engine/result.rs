//! Check requests, results and the result log.
//!
//! Classification is explicit: comparing a read version against the expected
//! one yields a [`CheckOutcome`], never an error. The result log is
//! append-only and keeps execution order.

use crate::probes::ProbeArgs;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One check to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// Display name
    pub name: String,
    /// Probe identifier as declared
    pub probe: String,
    pub args: ProbeArgs,
    pub expected_version: String,
}

impl CheckRequest {
    pub fn new(
        name: impl Into<String>,
        probe: impl Into<String>,
        expected_version: impl Into<String>,
    ) -> Self {
        CheckRequest {
            name: name.into(),
            probe: probe.into(),
            args: ProbeArgs::new(),
            expected_version: expected_version.into(),
        }
    }

    /// Add a keyword parameter for the probe.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Why a check failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckFailure {
    /// The probe could not be resolved, run, or parsed
    ProbeInvocation { message: String },
    /// The probe ran but reported a different version
    ComparisonMismatch { expected: String, read: String },
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::ProbeInvocation { message } => write!(f, "{}", message),
            CheckFailure::ComparisonMismatch { expected, read } => write!(
                f,
                "expected version: {} doesn't match with read version: {}",
                expected, read
            ),
        }
    }
}

/// Pass or fail, with the failure detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum CheckOutcome {
    Pass,
    Fail { error: CheckFailure },
}

impl CheckOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckOutcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        !self.is_pass()
    }
}

/// Exact string comparison of a read version against the expected one.
///
/// Vendor version strings are opaque; `"1.2.3"` and `"1.02.3"` differ.
pub fn compare_versions(expected: &str, read: &str) -> CheckOutcome {
    if expected == read {
        CheckOutcome::Pass
    } else {
        CheckOutcome::Fail {
            error: CheckFailure::ComparisonMismatch {
                expected: expected.to_string(),
                read: read.to_string(),
            },
        }
    }
}

/// A recorded check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub probe: String,
    #[serde(default, skip_serializing_if = "ProbeArgs::is_empty")]
    pub args: ProbeArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_version: Option<String>,
    pub expected_version: String,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

impl CheckResult {
    pub fn failure(&self) -> Option<&CheckFailure> {
        match &self.outcome {
            CheckOutcome::Pass => None,
            CheckOutcome::Fail { error } => Some(error),
        }
    }
}

/// Result summary statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[CheckResult]) -> Self {
        let failed = results.iter().filter(|r| r.outcome.is_fail()).count();
        RunSummary {
            total: results.len(),
            passed: results.len() - failed,
            failed,
        }
    }
}

/// Append-only log of check results, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultLog {
    entries: Vec<CheckResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        ResultLog {
            entries: Vec::new(),
        }
    }

    /// Append a result and return it.
    pub fn push(&mut self, result: CheckResult) -> &CheckResult {
        self.entries.push(result);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[CheckResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.entries.iter().filter(|r| r.outcome.is_fail())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(&self.entries)
    }
}
