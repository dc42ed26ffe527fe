//! Runs the [`Monitor`] on a timer and serves read-only queries.
//!
//! One task owns all mutation. Each tick it fetches a snapshot without holding
//! the state lock, then applies the whole reconciliation under a single write
//! lock and only afterwards announces the tick. Readers take the read lock, so
//! they see either the previous tick or this one, never a mix.

use std::{
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use color_eyre::eyre::{Result, eyre};
use log::*;
use tokio::{
    select,
    sync::{broadcast, oneshot},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    config::VitalsConfig,
    proc::{Metric, Monitor, ProcessView},
    source::SnapshotSource,
};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct MonitorService {
    state: Arc<RwLock<Monitor>>,
    updates: broadcast::Sender<u64>,
    interval: Duration,
    closer: Option<oneshot::Receiver<()>>,
    task: Option<JoinHandle<()>>,
}

impl MonitorService {
    pub fn new(monitor: Monitor, interval: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(monitor)),
            updates,
            interval,
            closer: None,
            task: None,
        }
    }

    pub fn from_config(config: &VitalsConfig) -> Self {
        Self::new(
            Monitor::new(config.window_size, config.network_stats),
            config.interval(),
        )
    }

    /// Start ticking. The first tick runs immediately.
    pub fn start<S>(&mut self, source: S) -> Result<()>
    where
        S: SnapshotSource,
    {
        if self.is_running() {
            return Err(eyre!("Monitor is already running"));
        }
        let (closed, closer) = oneshot::channel();
        self.closer = Some(closer);
        self.task = Some(tokio::spawn(tick_loop(
            self.state.clone(),
            self.updates.clone(),
            self.interval,
            source,
            closed,
        )));
        info!(target: "Monitor", "Started with a {:?} interval", self.interval);
        Ok(())
    }

    /// Stop ticking. An in-flight fetch is abandoned; a tick that is already
    /// being applied completes first.
    pub async fn stop(&mut self) {
        drop(self.closer.take());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(target: "Monitor", "Tick task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Fires once per completed tick with the tick number.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn top_processes(&self, metric: Metric, limit: usize) -> Vec<ProcessView> {
        self.read().top_views(metric, limit)
    }

    pub fn total_memory_usage(&self) -> f64 {
        self.read().total_memory_usage()
    }

    pub fn process_count(&self) -> usize {
        self.read().process_count()
    }

    pub fn ticks(&self) -> u64 {
        self.read().ticks()
    }

    pub fn network_stats_enabled(&self) -> bool {
        self.read().network_stats()
    }

    pub fn set_network_stats_enabled(&self, enabled: bool) {
        write(&self.state).set_network_stats(enabled);
    }

    /// Run several reads against one consistent tick.
    pub fn with_monitor<R>(&self, f: impl FnOnce(&Monitor) -> R) -> R {
        f(&self.read())
    }

    fn read(&self) -> RwLockReadGuard<'_, Monitor> {
        read(&self.state)
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn read(state: &RwLock<Monitor>) -> RwLockReadGuard<'_, Monitor> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(state: &RwLock<Monitor>) -> RwLockWriteGuard<'_, Monitor> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

async fn tick_loop<S>(
    state: Arc<RwLock<Monitor>>,
    updates: broadcast::Sender<u64>,
    interval: Duration,
    mut source: S,
    mut closed: oneshot::Sender<()>,
) where
    S: SnapshotSource,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            _ = ticker.tick() => {}
            _ = closed.closed() => break,
        }

        let network_stats = read(&state).network_stats();
        let fetched = select! {
            result = source.fetch(network_stats) => result,
            _ = closed.closed() => {
                debug!(target: "Monitor", "Abandoning in-flight fetch");
                break;
            }
        };

        match fetched {
            Ok(snapshot) => {
                let now = Instant::now().into_std();
                let tick = write(&state).apply(snapshot, now);
                // Nobody listening is fine.
                let _ = updates.send(tick);
            }
            Err(e) => error!(target: "Monitor", "Error retrieving process stats: {:#}", e),
        }
    }
    info!(target: "Monitor", "Stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        proc::{Pid, ProcessSample, Snapshot},
        source::scripted::ScriptedSource,
    };
    use tokio::time::{sleep, timeout};

    const INTERVAL: Duration = Duration::from_millis(5);
    const WAIT: Duration = Duration::from_secs(5);

    fn snapshot(entries: &[(Pid, f64, f64)]) -> Snapshot {
        entries
            .iter()
            .map(|&(pid, cpu, rss)| (pid, ProcessSample::new(format!("p{}", pid), cpu, cpu, rss)))
            .collect()
    }

    async fn next_update(rx: &mut broadcast::Receiver<u64>) -> u64 {
        timeout(WAIT, rx.recv())
            .await
            .expect("update within timeout")
            .expect("update channel open")
    }

    async fn wait_for_requests(source: &ScriptedSource, count: usize) {
        timeout(WAIT, async {
            while source.requests.lock().unwrap().len() < count {
                sleep(INTERVAL).await;
            }
        })
        .await
        .expect("fetches within timeout");
    }

    fn everything(service: &MonitorService) -> (f64, Vec<Vec<ProcessView>>) {
        service.with_monitor(|m| {
            let views = Metric::ALL
                .iter()
                .map(|&metric| m.top_views(metric, usize::MAX))
                .collect();
            (m.total_memory_usage(), views)
        })
    }

    #[tokio::test]
    async fn updates_are_published_in_tick_order() {
        let source = ScriptedSource::new([
            Ok(snapshot(&[(1, 0.0, 100.0)])),
            Ok(snapshot(&[(1, 1.0, 100.0), (2, 0.0, 50.0)])),
            Ok(snapshot(&[(2, 0.0, 50.0)])),
        ]);
        let mut service = MonitorService::new(Monitor::new(60, true), INTERVAL);
        let mut rx = service.subscribe();
        service.start(source).unwrap();

        assert_eq!(next_update(&mut rx).await, 1);
        assert_eq!(next_update(&mut rx).await, 2);
        assert_eq!(next_update(&mut rx).await, 3);
        service.stop().await;

        assert_eq!(service.ticks(), 3);
        assert_eq!(service.total_memory_usage(), 50.0);
        let top = service.top_processes(Metric::Cpu, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].pid, 1);
        assert!(!top[0].is_alive);
        assert!(top[0].aggregate > 0.0);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let source = ScriptedSource::new([
            Ok(snapshot(&[(1, 0.0, 100.0), (2, 0.0, 200.0)])),
            Ok(snapshot(&[(1, 0.5, 120.0), (2, 0.25, 210.0)])),
            Err("ps exited with 1".to_string()),
        ]);
        let mut service = MonitorService::new(Monitor::new(60, true), INTERVAL);
        let mut rx = service.subscribe();
        service.start(source.clone()).unwrap();

        assert_eq!(next_update(&mut rx).await, 1);
        assert_eq!(next_update(&mut rx).await, 2);
        let before = everything(&service);

        // The scripted failure, then the exhausted script keeps failing.
        wait_for_requests(&source, 5).await;
        service.stop().await;

        assert_eq!(everything(&service), before);
        assert_eq!(service.ticks(), 2);
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn network_toggle_applies_to_future_fetches() {
        let source = ScriptedSource::new([]);
        let mut service = MonitorService::new(Monitor::new(60, false), INTERVAL);
        service.start(source.clone()).unwrap();
        wait_for_requests(&source, 1).await;
        service.set_network_stats_enabled(true);
        let seen = source.requests.lock().unwrap().len();
        wait_for_requests(&source, seen + 2).await;
        service.stop().await;

        let requests = source.requests.lock().unwrap().clone();
        assert!(!requests[0]);
        assert!(*requests.last().unwrap());
        assert!(service.network_stats_enabled());
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let mut service = MonitorService::new(Monitor::default(), INTERVAL);
        assert!(!service.is_running());
        service.start(ScriptedSource::new([])).unwrap();
        assert!(service.is_running());
        assert!(service.start(ScriptedSource::new([])).is_err());

        service.stop().await;
        assert!(!service.is_running());
        service.stop().await;

        let source = ScriptedSource::new([Ok(snapshot(&[(7, 0.0, 1.0)]))]);
        let mut rx = service.subscribe();
        service.start(source).unwrap();
        assert_eq!(next_update(&mut rx).await, 1);
        service.stop().await;
        assert_eq!(service.process_count(), 1);
    }
}
