//! CLI module for argument parsing, logging setup and terminal output.

pub mod args;
pub mod logging;
pub mod output;
