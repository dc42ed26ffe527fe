use std::{
    fmt::{self, Display},
    num::ParseIntError,
    str::FromStr,
};

use log::*;

use crate::proc::{Pid, ProcessSample, Snapshot};

/// One row of `ps -o pid,cputime,utime,rss,comm` output.
#[derive(Debug, Clone, PartialEq)]
pub struct PsRow {
    pub pid: Pid,
    pub sample: ProcessSample,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsTimeError {
    /// not of the form `MM:SS.hh`.
    Shape,
    Digit(char),
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsLineError {
    FieldCount { found: usize },
    Pid(ParseIntError),
    CpuTime(PsTimeError),
    Memory(String),
}

/// Parses a cpu time of the form `MM:SS.hh` into seconds.
///
/// Minutes may have any number of digits; seconds and hundredths have exactly
/// two. The value is accumulated in integer hundredths and divided once.
pub fn parse_ps_time(time: &str) -> Result<f64, PsTimeError> {
    let (minutes, rest) = time.split_once(':').ok_or(PsTimeError::Shape)?;
    let (seconds, hundredths) = rest.split_once('.').ok_or(PsTimeError::Shape)?;
    if minutes.is_empty() || seconds.len() != 2 || hundredths.len() != 2 {
        return Err(PsTimeError::Shape);
    }

    let minutes = accumulate_digits(minutes)?;
    let seconds = accumulate_digits(seconds)?;
    let hundredths = accumulate_digits(hundredths)?;

    let total = minutes
        .checked_mul(6000)
        .and_then(|m| m.checked_add(seconds * 100 + hundredths))
        .ok_or(PsTimeError::Overflow)?;
    Ok(total as f64 / 100.0)
}

fn accumulate_digits(digits: &str) -> Result<u64, PsTimeError> {
    digits.chars().try_fold(0u64, |acc, c| {
        let digit = c.to_digit(10).ok_or(PsTimeError::Digit(c))?;
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(u64::from(digit)))
            .ok_or(PsTimeError::Overflow)
    })
}

/// A finite, non-negative count. Rejects `nan` and `inf`.
pub(super) fn parse_amount(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Decodes a whole `ps` listing. The first line is the column header.
pub fn parse_ps_output(output: &str) -> Snapshot {
    let mut samples = Snapshot::new();
    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<PsRow>() {
            Ok(PsRow { pid, sample }) => {
                samples.insert(pid, sample);
            }
            Err(e) => warn!(target: "Source", "Skipping ps line {:?}: {}", line, e),
        }
    }
    samples
}

// === impl PsRow ===

impl FromStr for PsRow {
    type Err = PsLineError;
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let field_count = || PsLineError::FieldCount {
            found: line.split_whitespace().count(),
        };

        // Four whitespace-separated columns; the command is the remainder and
        // may itself contain spaces.
        let mut rest = line.trim();
        let mut fields = [""; 4];
        for field in fields.iter_mut() {
            let end = rest.find(char::is_whitespace).ok_or_else(field_count)?;
            *field = &rest[..end];
            rest = rest[end..].trim_start();
        }
        let [pid, total, user, rss] = fields;
        let command = rest;
        if command.is_empty() {
            return Err(field_count());
        }

        let pid = pid.parse::<Pid>().map_err(PsLineError::Pid)?;
        let cpu_time_total = parse_ps_time(total).map_err(PsLineError::CpuTime)?;
        let cpu_time_user = parse_ps_time(user).map_err(PsLineError::CpuTime)?;
        let rss_kb = parse_amount(rss).ok_or_else(|| PsLineError::Memory(rss.to_string()))?;

        Ok(PsRow {
            pid,
            sample: ProcessSample::new(command, cpu_time_total, cpu_time_user, rss_kb),
        })
    }
}

// === impl PsTimeError ===

impl std::error::Error for PsTimeError {}

impl Display for PsTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape => f.write_str("expected a time of the form MM:SS.hh"),
            Self::Digit(c) => write!(f, "unexpected character {:?} in time", c),
            Self::Overflow => f.write_str("time is too large"),
        }
    }
}

// === impl PsLineError ===

impl std::error::Error for PsLineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pid(e) => Some(e),
            Self::CpuTime(e) => Some(e),
            Self::FieldCount { .. } | Self::Memory(_) => None,
        }
    }
}

impl Display for PsLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { found } => write!(f, "expected 5 fields, found {}", found),
            Self::Pid(e) => write!(f, "bad pid: {}", e),
            Self::CpuTime(e) => write!(f, "bad cpu time: {}", e),
            Self::Memory(rss) => write!(f, "bad resident memory {:?}", rss),
        }
    }
}
