use std::{
    fmt::Write as _,
    io::{self, Write},
    path::PathBuf,
};

use color_eyre::eyre::Result;
use log::*;

use crate::{
    config::{ConfigManager, VitalsConfig},
    event::{AppEvent, Event, EventHandler},
    format::{format_value, sparkline},
    proc::{Metric, Monitor, ProcessView},
    service::MonitorService,
    source::AnySource,
};

const NAME_WIDTH: usize = 28;
const SPARK_WIDTH: usize = 30;

pub struct App {
    pub running: bool,
    pub events: EventHandler,
    pub config: ConfigManager,
    pub service: MonitorService,
    pub report: ReportSettings,
    last_reported: u64,
}

/// What the report shows. Command-line flags win over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub metric: Metric,
    pub limit: usize,
    metric_override: Option<Metric>,
    limit_override: Option<usize>,
}

impl ReportSettings {
    pub fn new(config: &VitalsConfig, metric: Option<Metric>, limit: Option<usize>) -> Self {
        Self {
            metric: metric.unwrap_or(config.metric),
            limit: limit.unwrap_or(config.limit),
            metric_override: metric,
            limit_override: limit,
        }
    }

    pub fn reload(&mut self, config: &VitalsConfig) {
        *self = Self::new(config, self.metric_override, self.limit_override);
    }
}

impl App {
    pub fn new(config_path: PathBuf, metric: Option<Metric>, limit: Option<usize>) -> Result<Self> {
        let events = EventHandler::new();
        let config = ConfigManager::new(config_path, events.clone_sender())?;
        let current = config.current();
        Ok(Self {
            running: true,
            service: MonitorService::from_config(&current),
            report: ReportSettings::new(&current, metric, limit),
            last_reported: 0,
            events,
            config,
        })
    }

    /// Run the application's main loop.
    pub async fn run(&mut self) -> Result<()> {
        self.events.forward_updates(self.service.subscribe());
        self.events.quit_on_ctrl_c();
        self.service
            .start(AnySource::from_config(&self.config.current()))?;

        while self.running {
            match self.events.next().await? {
                Event::Updated(_) => self.print_report()?,
                Event::App(AppEvent::Reload) => self.reload_config(),
                Event::App(AppEvent::Quit) => self.quit(),
            }
        }
        self.service.stop().await;
        Ok(())
    }

    /// Print the latest tick. Late notifications for a tick already shown are dropped.
    fn print_report(&mut self) -> Result<()> {
        let (tick, text) = self
            .service
            .with_monitor(|monitor| (monitor.ticks(), render_report(monitor, &self.report)));
        if tick <= self.last_reported {
            return Ok(());
        }
        self.last_reported = tick;
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    fn quit(&mut self) {
        info!(target: "App", "Quitting");
        self.running = false;
    }

    fn reload_config(&mut self) {
        debug!(target: "App", "Reload!");
        let previous = self.config.current();
        match self.config.reload() {
            Ok(config) => {
                self.service.set_network_stats_enabled(config.network_stats);
                self.report.reload(&config);
                if config.interval_ms != previous.interval_ms
                    || config.window_size != previous.window_size
                    || config.source != previous.source
                    || config.ps_command != previous.ps_command
                    || config.nettop_command != previous.nettop_command
                {
                    warn!(target: "App", "Sampling settings changed; restart to apply them");
                }
            }
            Err(e) => error!(target: "App", "{}", e),
        }
    }
}

/// The text printed after each tick, all read from the monitor's latest tick.
pub fn render_report(monitor: &Monitor, settings: &ReportSettings) -> String {
    let metric = settings.metric.available(monitor.network_stats());
    let total_memory = monitor.total_memory_usage();
    let views = monitor.top_views(metric, settings.limit);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "tick {} | {} | {} processes | {} resident",
        monitor.ticks(),
        metric,
        monitor.process_count(),
        format_value(Metric::Memory, Some(total_memory)),
    );
    let _ = writeln!(
        out,
        "{:>7}   {:<width$} {:>9}  HISTORY",
        "PID",
        "NAME",
        "CURRENT",
        width = NAME_WIDTH
    );
    for view in &views {
        let _ = writeln!(out, "{}", render_row(view, total_memory));
    }
    out.push('\n');
    out
}

fn render_row(view: &ProcessView, total_memory: f64) -> String {
    let status = if view.is_alive { '●' } else { '○' };
    let name: String = view.display_name.chars().take(NAME_WIDTH).collect();
    format!(
        "{:>7} {} {:<width$} {:>9}  {}",
        view.pid,
        status,
        name,
        format_value(view.metric, view.current),
        sparkline(view.metric, &view.history, total_memory, SPARK_WIDTH),
        width = NAME_WIDTH
    )
}
