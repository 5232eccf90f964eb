//! Resolves the process selection into (labeler, process) pairs.
//!
//! Resolution is repeated on every update cycle; nothing is cached, so
//! processes that appear or exit between scrapes are picked up naturally.

use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::label::Labeler;
use crate::process::{collect_pids, Process};

/// Which processes to report on. The two modes are mutually exclusive.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Explicit process ids.
    Pids(Vec<u32>),
    /// Regular expressions matched against process command lines.
    CmdlineRegexps(Vec<Regex>),
}

/// Produces a fresh sequence of processes for the configured selection.
#[derive(Debug, Clone)]
pub struct ProcessResolver {
    selection: Selection,
    proc_root: PathBuf,
}

impl ProcessResolver {
    pub fn new(selection: Selection, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            selection,
            proc_root: proc_root.into(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// Lazily yields (labeler, process) pairs.
    ///
    /// In pid mode a pid without a process directory is dropped. In regexp
    /// mode the process table is scanned once per expression, so a process
    /// matching several expressions is yielded once for each of them.
    pub fn resolve(&self) -> Box<dyn Iterator<Item = (Labeler, Process)> + '_> {
        let root = self.proc_root.as_path();
        match &self.selection {
            Selection::Pids(pids) => Box::new(pids.iter().filter_map(move |&pid| {
                let process = Process::new(pid, root);
                if process.exists() {
                    Some((Labeler::Pid, process))
                } else {
                    debug!("Configured pid {} is not running", pid);
                    None
                }
            })),
            Selection::CmdlineRegexps(regexps) => Box::new(regexps.iter().flat_map(move |re| {
                collect_pids(root).into_iter().filter_map(move |pid| {
                    let process = Process::new(pid, root);
                    match process.cmdline() {
                        Ok(cmdline) if re.is_match(&cmdline) => {
                            Some((Labeler::Cmdline(re.clone()), process))
                        }
                        Ok(_) => None,
                        Err(e) => {
                            trace!("Skipping pid {}: {}", pid, e);
                            None
                        }
                    }
                })
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn make_process(root: &Path, pid: u32, comm: &str, cmdline: &str) {
        let base = root.join(pid.to_string());
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("comm"), format!("{comm}\n")).unwrap();
        fs::write(base.join("cmdline"), cmdline.replace(' ', "\0")).unwrap();
    }

    #[test]
    fn test_resolve_pids_drops_missing() {
        let root = tempdir().unwrap();
        make_process(root.path(), 10, "a", "a");
        make_process(root.path(), 30, "c", "c");

        let resolver = ProcessResolver::new(Selection::Pids(vec![10, 20, 30]), root.path());
        let pairs: Vec<_> = resolver.resolve().collect();
        let pids: Vec<u32> = pairs.iter().map(|(_, p)| p.pid).collect();
        assert_eq!(pids, vec![10, 30]);
        assert!(pairs.iter().all(|(l, _)| matches!(l, Labeler::Pid)));
    }

    #[test]
    fn test_resolve_regexps_matches_cmdline() {
        let root = tempdir().unwrap();
        make_process(root.path(), 1, "init", "/sbin/init splash");
        make_process(root.path(), 10, "exec1", "/usr/bin/exec1 --flag");
        make_process(root.path(), 20, "exec2", "/usr/bin/exec2");

        let re = Regex::new("exec.*").unwrap();
        let resolver = ProcessResolver::new(Selection::CmdlineRegexps(vec![re]), root.path());
        let pids: Vec<u32> = resolver.resolve().map(|(_, p)| p.pid).collect();
        assert_eq!(pids, vec![10, 20]);
    }

    #[test]
    fn test_resolve_regexps_multi_match_not_deduplicated() {
        let root = tempdir().unwrap();
        make_process(root.path(), 10, "postgres", "postgres -D /data");

        let regexps = vec![Regex::new("postgres").unwrap(), Regex::new("-D").unwrap()];
        let resolver = ProcessResolver::new(Selection::CmdlineRegexps(regexps), root.path());
        let pairs: Vec<_> = resolver.resolve().collect();
        assert_eq!(pairs.len(), 2);
        let exprs: Vec<&str> = pairs
            .iter()
            .filter_map(|(l, _)| l.regexp().map(Regex::as_str))
            .collect();
        assert_eq!(exprs, vec!["postgres", "-D"]);
    }

    #[test]
    fn test_resolve_is_fresh_each_call() {
        let root = tempdir().unwrap();
        make_process(root.path(), 10, "exec1", "exec1");

        let re = Regex::new("exec").unwrap();
        let resolver = ProcessResolver::new(Selection::CmdlineRegexps(vec![re]), root.path());
        assert_eq!(resolver.resolve().count(), 1);

        make_process(root.path(), 11, "exec2", "exec2");
        assert_eq!(resolver.resolve().count(), 2);

        fs::remove_dir_all(root.path().join("10")).unwrap();
        assert_eq!(resolver.resolve().count(), 1);
    }
}
