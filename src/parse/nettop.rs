use std::{
    fmt::{self, Display},
    num::ParseIntError,
    str::FromStr,
};

use log::*;

use super::ps::parse_amount;
use crate::proc::{Pid, Snapshot};

/// One row of `nettop -P -x -J bytes_in,bytes_out` output, e.g.
/// `launchd.1,5120,2048,`.
#[derive(Debug, Clone, PartialEq)]
pub struct NettopRow {
    pub pid: Pid,
    pub bytes_in: f64,
    pub bytes_out: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NettopLineError {
    FieldCount { found: usize },
    /// the identifier has no `.<pid>` suffix.
    MissingPid { identifier: String },
    Pid(ParseIntError),
    Bytes(String),
}

/// Attaches network counters from a `nettop` listing to the processes in
/// `samples`. The first line is the column header.
///
/// Rows for pids that are not in `samples` are dropped.
pub fn attach_network_output(samples: &mut Snapshot, output: &str) {
    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let row = match line.parse::<NettopRow>() {
            Ok(row) => row,
            Err(e) => {
                warn!(target: "Source", "Skipping nettop line {:?}: {}", line, e);
                continue;
            }
        };
        match samples.get_mut(&row.pid) {
            Some(sample) => {
                sample.network_bytes_in = Some(row.bytes_in);
                sample.network_bytes_out = Some(row.bytes_out);
            }
            None => warn!(
                target: "Source",
                "Dropping network stats for pid {} missing from the process table",
                row.pid
            ),
        }
    }
}

// === impl NettopRow ===

impl FromStr for NettopRow {
    type Err = NettopLineError;
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        // Rows end with a separator; only that one trailing empty field goes.
        let line = line.trim();
        let line = line.strip_suffix(',').unwrap_or(line);
        let fields = line.split(',').collect::<Vec<_>>();
        let [identifier, bytes_in, bytes_out] = fields.as_slice() else {
            return Err(NettopLineError::FieldCount {
                found: fields.len(),
            });
        };

        let (_, pid) = identifier
            .rsplit_once('.')
            .ok_or_else(|| NettopLineError::MissingPid {
                identifier: identifier.to_string(),
            })?;
        let pid = pid.parse::<Pid>().map_err(NettopLineError::Pid)?;
        let bytes = |field: &str| {
            parse_amount(field.trim()).ok_or_else(|| NettopLineError::Bytes(field.to_string()))
        };
        let bytes_in = bytes(*bytes_in)?;
        let bytes_out = bytes(*bytes_out)?;

        Ok(NettopRow {
            pid,
            bytes_in,
            bytes_out,
        })
    }
}

// === impl NettopLineError ===

impl std::error::Error for NettopLineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pid(e) => Some(e),
            Self::FieldCount { .. } | Self::MissingPid { .. } | Self::Bytes(_) => None,
        }
    }
}

impl Display for NettopLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { found } => write!(f, "expected 3 fields, found {}", found),
            Self::MissingPid { identifier } => {
                write!(f, "no pid suffix in identifier {:?}", identifier)
            }
            Self::Pid(e) => write!(f, "bad pid: {}", e),
            Self::Bytes(bytes) => write!(f, "bad byte count {:?}", bytes),
        }
    }
}
