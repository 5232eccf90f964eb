//! Handle to a single process (or task) under a proc root.
//!
//! A `Process` holds a numeric id and its base directory, e.g.
//! `/proc/1234` or `/proc/1234/task/1240`. Numeric facts are only available
//! after `collect_stats()` has read the kernel files; handles are short-lived
//! and never cached across update cycles.

use ahash::AHashMap as HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::process::parser::{parse_stat, parse_status};
use crate::process::ProcReadError;

/// Reads a file below a process directory, mapping "not found" to `Gone`.
///
/// Command names and arguments are arbitrary bytes; invalid UTF-8 is
/// replaced rather than failing the read.
fn read_proc_file(base: &Path, name: &str) -> Result<String, ProcReadError> {
    let bytes = fs::read(base.join(name)).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProcReadError::Gone,
        _ => ProcReadError::Io(e),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Process or task handle backed by a `/proc`-style directory.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: u32,
    path: PathBuf,
    state: Option<char>,
    facts: HashMap<String, f64>,
}

impl Process {
    /// Creates a handle for `pid` below `proc_root`.
    pub fn new(pid: u32, proc_root: &Path) -> Self {
        Self::with_path(pid, proc_root.join(pid.to_string()))
    }

    /// Creates a handle with an explicit base directory.
    pub fn with_path(pid: u32, path: PathBuf) -> Self {
        Self {
            pid,
            path,
            state: None,
            facts: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the base directory currently exists.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Re-reads kernel counters from `stat` and `status`.
    ///
    /// Fails if `stat` cannot be read or parsed. `status` is optional; when it
    /// is missing the `status.*` facts are simply absent.
    pub fn collect_stats(&mut self) -> Result<(), ProcReadError> {
        let stat = parse_stat(&read_proc_file(&self.path, "stat")?)?;

        self.facts.clear();
        self.state = stat.state;
        for (name, value) in stat.fields {
            self.facts.insert(format!("stat.{name}"), value);
        }

        match read_proc_file(&self.path, "status") {
            Ok(content) => {
                for (key, value) in parse_status(&content) {
                    self.facts.insert(format!("status.{key}"), value);
                }
            }
            Err(e) => trace!("No status for pid {}: {}", self.pid, e),
        }

        Ok(())
    }

    /// Returns a collected fact such as `stat.minflt` or `status.VmHWM`.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.facts.get(field).copied()
    }

    /// Scheduling state character from the last `collect_stats()`.
    pub fn state(&self) -> Option<char> {
        self.state
    }

    /// Command name from `comm`.
    pub fn comm(&self) -> Result<String, ProcReadError> {
        Ok(read_proc_file(&self.path, "comm")?.trim().to_string())
    }

    /// Full command line with arguments separated by spaces.
    ///
    /// Kernel threads have an empty `cmdline`; their `comm` is used instead.
    pub fn cmdline(&self) -> Result<String, ProcReadError> {
        let raw = read_proc_file(&self.path, "cmdline")?;
        let cmdline = raw
            .split('\0')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if cmdline.is_empty() {
            self.comm()
        } else {
            Ok(cmdline)
        }
    }

    /// Lists the tasks (threads) of this process, ordered by task id.
    pub fn tasks(&self) -> Result<Vec<Process>, ProcReadError> {
        let task_dir = self.path.join("task");
        let entries = fs::read_dir(&task_dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ProcReadError::Gone,
            _ => ProcReadError::Io(e),
        })?;

        let mut tasks: Vec<Process> = entries
            .flatten()
            .filter_map(|entry| {
                let tid: u32 = entry.file_name().to_str()?.parse().ok()?;
                Some(Process::with_path(tid, entry.path()))
            })
            .collect();
        tasks.sort_by_key(|t| t.pid);
        Ok(tasks)
    }
}
