//! CLI command implementations for process-stats-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and proc filesystem validation
//! - `test`: Runs update cycles and prints the resulting metrics

pub mod check;

// Re-export command functions
pub use check::command_check;
pub use test::command_test;
