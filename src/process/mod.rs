//! Process-related modules for reading per-process statistics.
//!
//! This module provides:
//! - `parser`: Parsing of /proc/<pid>/stat and /proc/<pid>/status
//! - `handle`: The `Process` handle with its fact store and tasks
//! - `scanner`: Process discovery under a proc root

pub mod handle;
pub mod parser;
pub mod scanner;

// Re-export commonly used types
pub use handle::Process;
pub use parser::{parse_stat, parse_status, CLK_TCK, PAGE_SIZE};
pub use scanner::collect_pids;

/// Failure to read a process's kernel files.
#[derive(Debug, thiserror::Error)]
pub enum ProcReadError {
    #[error("process no longer exists")]
    Gone,

    #[error("failed to read process file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse process file: {0}")]
    Parse(String),
}
