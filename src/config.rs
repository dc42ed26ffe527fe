//! Provides a ConfigManager to read and refresh config from files.
//!

use color_eyre::{Result, eyre::eyre};
use log::*;
use notify::{RecommendedWatcher, Watcher};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    event::{AppEvent, Event},
    proc::Metric,
    window::DEFAULT_WINDOW_SIZE,
};

pub const DEFAULT_FILE: &str = "vitals.toml";
pub const ENV_PREFIX: &str = "VITALS";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `ps` for the process table and `nettop` for network counters.
    #[default]
    Ps,
    /// In-process via the `sysinfo` crate; no network counters.
    Sysinfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_true")]
    pub network_stats: bool,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default = "default_ps_command")]
    pub ps_command: String,
    #[serde(default = "default_nettop_command")]
    pub nettop_command: String,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_true() -> bool {
    true
}

fn default_ps_command() -> String {
    "/bin/ps -e -c -o pid,cputime,utime,rss,comm".to_string()
}

fn default_nettop_command() -> String {
    "/usr/bin/nettop -P -L 1 -n -x -J bytes_in,bytes_out".to_string()
}

fn default_limit() -> usize {
    20
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            window_size: default_window_size(),
            network_stats: default_true(),
            source: SourceKind::default(),
            ps_command: default_ps_command(),
            nettop_command: default_nettop_command(),
            metric: Metric::default(),
            limit: default_limit(),
        }
    }
}

impl VitalsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(eyre!("interval_ms must be greater than zero"));
        }
        if self.window_size == 0 {
            return Err(eyre!("window_size must be greater than zero"));
        }
        if self.source == SourceKind::Ps {
            crate::source::build_command(&self.ps_command)?;
            if self.network_stats {
                crate::source::build_command(&self.nettop_command)?;
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    pub file_path: PathBuf,
    config: VitalsConfig,
    _watcher: Option<RecommendedWatcher>,
}

impl ConfigManager {
    pub fn new(file_path: PathBuf, sender: UnboundedSender<Event>) -> Result<ConfigManager> {
        let config = Self::load_from_file(file_path.clone())?;
        let watcher = if file_path.exists() {
            let captured = sender.clone();
            let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                if res.is_ok_and(|e| e.kind.is_modify() || e.kind.is_create()) {
                    let _ = captured.send(Event::App(AppEvent::Reload));
                }
            })?;
            info!(target: "Config", "Watching file {:?}", file_path);
            watcher.watch(&file_path, notify::RecursiveMode::NonRecursive)?;
            Some(watcher)
        } else {
            info!(target: "Config", "No config file at {:?}, using defaults", file_path);
            None
        };
        Ok(ConfigManager {
            file_path,
            config,
            _watcher: watcher,
        })
    }

    pub fn current(&self) -> VitalsConfig {
        self.config.clone()
    }

    /// Re-read the file. On error the previous config stays current.
    pub fn reload(&mut self) -> Result<VitalsConfig> {
        self.config = Self::load_from_file(self.file_path.clone())?;
        Ok(self.current())
    }

    /// Layer the (optional) file under `VITALS_*` environment variables.
    pub fn load_from_file(file_path: PathBuf) -> Result<VitalsConfig> {
        let raw = config::Config::builder()
            .add_source(config::File::from(file_path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let config: VitalsConfig = raw.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
