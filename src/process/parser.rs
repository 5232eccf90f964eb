//! Parsers for `/proc/<pid>/stat` and `/proc/<pid>/status` content.
//!
//! These are pure functions over file content so they can be tested with
//! plain strings. Values are returned in the kernel's own units; unit
//! conversion happens in the stat tables.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;

use crate::process::ProcReadError;

/// Field names of `/proc/<pid>/stat`, starting at the state field (index 2).
///
/// See proc(5). Only the fields up to `rsslim` are named; later fields are
/// ignored.
const STAT_FIELDS: &[&str] = &[
    "state",
    "ppid",
    "pgrp",
    "session",
    "tty_nr",
    "tpgid",
    "flags",
    "minflt",
    "cminflt",
    "majflt",
    "cmajflt",
    "utime",
    "stime",
    "cutime",
    "cstime",
    "priority",
    "nice",
    "num_threads",
    "itrealvalue",
    "starttime",
    "vsize",
    "rss",
    "rsslim",
];

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    100.0
}

/// Get the memory page size in bytes.
fn get_page_size() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as f64;
            }
        }
    }
    4096.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes (for RSS calculation).
pub static PAGE_SIZE: Lazy<f64> = Lazy::new(get_page_size);

/// Parsed content of `/proc/<pid>/stat`.
#[derive(Debug, Clone, Default)]
pub struct StatLine {
    pub comm: Option<String>,
    pub state: Option<char>,
    pub fields: HashMap<&'static str, f64>,
}

/// Parses `/proc/<pid>/stat` content.
///
/// The command name may contain spaces and parentheses, so fields are taken
/// from after the last `)`. Content without parentheses is split on
/// whitespace alone.
pub fn parse_stat(content: &str) -> Result<StatLine, ProcReadError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ProcReadError::Parse("empty stat".into()));
    }

    let (comm, rest) = match (content.find('('), content.rfind(')')) {
        (Some(open), Some(close)) if close > open => (
            Some(content[open + 1..close].to_string()),
            &content[close + 1..],
        ),
        (None, None) => {
            let mut parts = content.splitn(3, char::is_whitespace);
            let _pid = parts.next();
            let comm = parts.next().map(str::to_string);
            (comm, parts.next().unwrap_or(""))
        }
        _ => return Err(ProcReadError::Parse("unbalanced parentheses in stat".into())),
    };

    let values: Vec<&str> = rest.split_whitespace().collect();
    if values.is_empty() {
        return Err(ProcReadError::Parse("no fields after comm in stat".into()));
    }

    let mut line = StatLine {
        comm,
        state: values[0].chars().next(),
        fields: HashMap::new(),
    };

    // state is a character; numeric fields start at ppid
    for (name, raw) in STAT_FIELDS.iter().zip(values.iter()).skip(1) {
        if let Ok(v) = raw.parse::<f64>() {
            line.fields.insert(*name, v);
        }
    }

    Ok(line)
}

/// Parses the numeric keys of `/proc/<pid>/status`.
///
/// Lines look like `VmHWM:	    1234 kB` or `voluntary_ctxt_switches:	42`.
/// The unit suffix is dropped; non-numeric values are skipped.
pub fn parse_status(content: &str) -> HashMap<String, f64> {
    let mut out = HashMap::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(first) = value.split_whitespace().next() else {
            continue;
        };
        if let Ok(v) = first.parse::<f64>() {
            out.insert(key.trim().to_string(), v);
        }
    }
    out
}
