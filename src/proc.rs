//! Per-process state tracked across ticks.

pub mod history;
pub mod monitor;
pub mod stats;

pub use history::ProcessHistory;
pub use monitor::{Monitor, ProcessView};
pub use stats::{Metric, Pid, ProcessSample, Snapshot};
