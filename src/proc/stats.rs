use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub type Pid = u32;

/// One tick's worth of samples, keyed by pid.
pub type Snapshot = HashMap<Pid, ProcessSample>;

/// Cumulative accounting for one process at a point in time.
///
/// CPU times are seconds since process start, memory is resident set size in
/// KB (not cumulative), network counters are bytes since process start and
/// only present when network accounting was requested and reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub command: String,
    pub cpu_time_user: f64,
    pub cpu_time_system: f64,
    pub cpu_time_total: f64,
    pub memory_resident_set: f64,
    pub network_bytes_in: Option<f64>,
    pub network_bytes_out: Option<f64>,
}

impl ProcessSample {
    pub fn new(command: impl Into<String>, cpu_time_total: f64, cpu_time_user: f64, rss_kb: f64) -> Self {
        Self {
            command: command.into(),
            cpu_time_user,
            cpu_time_system: cpu_time_total - cpu_time_user,
            cpu_time_total,
            memory_resident_set: rss_kb,
            network_bytes_in: None,
            network_bytes_out: None,
        }
    }

    pub fn with_network(mut self, bytes_in: f64, bytes_out: f64) -> Self {
        self.network_bytes_in = Some(bytes_in);
        self.network_bytes_out = Some(bytes_out);
        self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    #[default]
    Cpu,
    Memory,
    NetworkIn,
    NetworkOut,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::NetworkIn,
        Metric::NetworkOut,
    ];

    pub fn is_network(self) -> bool {
        matches!(self, Metric::NetworkIn | Metric::NetworkOut)
    }

    /// The metric to actually show: network metrics fall back to CPU when
    /// network accounting is off.
    pub fn available(self, network_enabled: bool) -> Metric {
        if self.is_network() && !network_enabled {
            Metric::Cpu
        } else {
            self
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::NetworkIn => "network-in",
            Metric::NetworkOut => "network-out",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetric(pub String);

impl fmt::Display for UnknownMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown metric {:?} (expected cpu, memory, network-in or network-out)",
            self.0
        )
    }
}

impl std::error::Error for UnknownMetric {}

impl FromStr for Metric {
    type Err = UnknownMetric;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}
