//! Per-process resource sampling with fixed-length rolling history.
//!
//! A [`source::SnapshotSource`] produces cumulative per-process counters, the
//! [`proc::Monitor`] turns consecutive snapshots into per-second rates kept in
//! [`window::RateWindow`]s, and [`service::MonitorService`] drives it on a
//! timer and answers ranking queries.

pub mod app;
pub mod config;
pub mod event;
pub mod format;
pub mod parse;
pub mod proc;
pub mod service;
pub mod source;
pub mod window;

pub use proc::{Metric, Monitor, Pid, ProcessSample, ProcessView, Snapshot};
pub use service::MonitorService;
