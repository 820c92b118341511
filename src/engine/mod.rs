//! Validation engine module.
//!
//! Provides topology derivation, the compare-and-record protocol and result
//! aggregation.

pub mod result;
pub mod sink;
pub mod topology;
pub mod validator;

pub use result::{ResultLog, RunSummary};
pub use sink::OutputSink;
pub use validator::{AcceleratorLink, EngineSnapshot, ValidationEngine};
