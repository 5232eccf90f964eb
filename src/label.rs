//! Labelers produce the label dimension attached to every sample of a process.
//!
//! A labeler is chosen by the selection mode: explicit pids are labeled with
//! `pid`, command line matches with `cmd`.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::process::{ProcReadError, Process};

/// Label name used in pid selection mode.
pub const PID_LABEL: &str = "pid";

/// Label name used in command line selection mode.
pub const CMD_LABEL: &str = "cmd";

/// Mapping from label name to label value.
pub type LabelSet = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("process {pid} is unreadable: {source}")]
    Unreadable { pid: u32, source: ProcReadError },
}

/// Policy that labels samples of a process.
#[derive(Debug, Clone)]
pub enum Labeler {
    /// Labels with the stringified process id.
    Pid,
    /// Labels with the command name. The regexp only selects processes, it is
    /// not used to derive the label value.
    Cmdline(Regex),
}

impl Labeler {
    /// Names of the labels this labeler produces.
    pub fn labels(&self) -> BTreeSet<String> {
        let name = match self {
            Labeler::Pid => PID_LABEL,
            Labeler::Cmdline(_) => CMD_LABEL,
        };
        BTreeSet::from([name.to_string()])
    }

    /// Returns the label values for `process`.
    pub fn apply(&self, process: &Process) -> Result<LabelSet, LabelError> {
        match self {
            Labeler::Pid => Ok(LabelSet::from([(
                PID_LABEL.to_string(),
                process.pid.to_string(),
            )])),
            Labeler::Cmdline(_) => {
                let comm = process.comm().map_err(|source| LabelError::Unreadable {
                    pid: process.pid,
                    source,
                })?;
                Ok(LabelSet::from([(CMD_LABEL.to_string(), comm)]))
            }
        }
    }

    /// The selecting expression, for command line labelers.
    pub fn regexp(&self) -> Option<&Regex> {
        match self {
            Labeler::Pid => None,
            Labeler::Cmdline(re) => Some(re),
        }
    }
}
