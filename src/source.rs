//! Providers of per-process snapshots.

use std::future::Future;

use color_eyre::eyre::eyre;
use log::*;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::{
    config::{SourceKind, VitalsConfig},
    parse::{attach_network_output, parse_ps_output},
    proc::{ProcessSample, Snapshot},
};

pub use self::command::{build_command, run_command};

mod command;

/// Something that can take a snapshot of every visible process.
///
/// An `Err` means the snapshot could not be taken at all and is never the same
/// thing as an empty snapshot.
pub trait SnapshotSource: Send + 'static {
    /// When `network_stats` is set, also try to fill in the network counters.
    fn fetch(
        &mut self,
        network_stats: bool,
    ) -> impl Future<Output = color_eyre::Result<Snapshot>> + Send;
}

/// Either of the built-in sources, picked by configuration.
#[derive(Debug)]
pub enum AnySource {
    Ps(PsSource),
    Sysinfo(SysinfoSource),
}

impl AnySource {
    pub fn from_config(config: &VitalsConfig) -> Self {
        match config.source {
            SourceKind::Ps => AnySource::Ps(PsSource::new(
                config.ps_command.clone(),
                config.nettop_command.clone(),
            )),
            SourceKind::Sysinfo => AnySource::Sysinfo(SysinfoSource::new()),
        }
    }
}

impl SnapshotSource for AnySource {
    async fn fetch(&mut self, network_stats: bool) -> color_eyre::Result<Snapshot> {
        match self {
            AnySource::Ps(source) => source.fetch(network_stats).await,
            AnySource::Sysinfo(source) => source.fetch(network_stats).await,
        }
    }
}

// === PsSource ===

/// Snapshots from the `ps` process table, plus `nettop` for network counters.
#[derive(Debug, Clone)]
pub struct PsSource {
    ps_command: String,
    nettop_command: String,
}

impl PsSource {
    pub fn new(ps_command: String, nettop_command: String) -> Self {
        Self {
            ps_command,
            nettop_command,
        }
    }
}

impl SnapshotSource for PsSource {
    async fn fetch(&mut self, network_stats: bool) -> color_eyre::Result<Snapshot> {
        let output = run_command(&self.ps_command).await?;
        if output.trim().is_empty() {
            return Err(eyre!("{:?} produced no output", self.ps_command));
        }
        let mut samples = parse_ps_output(&output);

        if network_stats {
            match run_command(&self.nettop_command).await {
                Ok(output) => attach_network_output(&mut samples, &output),
                Err(e) => warn!(target: "Source", "Network stats unavailable: {}", e),
            }
        }
        Ok(samples)
    }
}

// === SysinfoSource ===

/// In-process snapshots via `sysinfo`. Has no per-process network counters.
pub struct SysinfoSource {
    sys: System,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSource")
            .field("processes", &self.sys.processes().len())
            .finish()
    }
}

impl SnapshotSource for SysinfoSource {
    async fn fetch(&mut self, _network_stats: bool) -> color_eyre::Result<Snapshot> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        let samples: Snapshot = self
            .sys
            .processes()
            .iter()
            .filter(|(_, p)| p.thread_kind().is_none())
            .map(|(pid, p)| {
                let cpu_seconds = p.accumulated_cpu_time() as f64 / 1000.0;
                let sample = ProcessSample::new(
                    p.name().to_string_lossy(),
                    cpu_seconds,
                    // No user/system split is available here.
                    cpu_seconds,
                    p.memory() as f64 / 1024.0,
                );
                (pid.as_u32(), sample)
            })
            .collect();
        if samples.is_empty() {
            return Err(eyre!("sysinfo reported no processes"));
        }
        Ok(samples)
    }
}
