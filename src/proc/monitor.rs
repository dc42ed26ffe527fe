use std::{collections::HashMap, time::Instant};

use log::*;

use crate::{
    proc::{
        history::ProcessHistory,
        stats::{Metric, Pid, Snapshot},
    },
    window::DEFAULT_WINDOW_SIZE,
};

/// Owned, copyable view of one tracked process for a given metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessView {
    pub pid: Pid,
    pub display_name: String,
    pub is_alive: bool,
    pub metric: Metric,
    /// Oldest first, one entry per window slot.
    pub history: Vec<Option<f64>>,
    pub current: Option<f64>,
    pub aggregate: f64,
}

impl ProcessView {
    pub fn new(history: &ProcessHistory, metric: Metric) -> Self {
        Self {
            pid: history.pid,
            display_name: history.display_name.clone(),
            is_alive: history.is_alive,
            metric,
            history: history.values_for(metric),
            current: history.current(metric),
            aggregate: history.sort_key_for(metric),
        }
    }
}

/// Reconciles snapshots against the tracked process table.
#[derive(Debug)]
pub struct Monitor {
    histories: HashMap<Pid, ProcessHistory>,
    /// Tracked pids in first-seen order, for stable tie-breaking.
    order: Vec<Pid>,
    total_memory_usage: f64,
    network_stats: bool,
    window_size: usize,
    ticks: u64,
}

impl Monitor {
    pub fn new(window_size: usize, network_stats: bool) -> Self {
        Self {
            histories: HashMap::new(),
            order: Vec::new(),
            total_memory_usage: 0.0,
            network_stats,
            window_size,
            ticks: 0,
        }
    }

    /// Apply one successful tick. Returns the tick number.
    pub fn apply(&mut self, mut snapshot: Snapshot, now: Instant) -> u64 {
        self.total_memory_usage = snapshot.values().map(|s| s.memory_resident_set).sum();

        let mut evicted = Vec::new();
        for (pid, history) in self.histories.iter_mut() {
            let sample = snapshot.remove(pid);
            let present = sample.is_some();
            history.add_sample(sample, now);
            if !present && history.is_stale() {
                evicted.push(*pid);
            }
        }
        if !evicted.is_empty() {
            debug!(target: "Monitor", "Evicting {} stale processes", evicted.len());
            for pid in &evicted {
                self.histories.remove(pid);
            }
            self.order.retain(|pid| self.histories.contains_key(pid));
        }

        // Whatever is left in the snapshot is new. Sorted so that processes
        // first seen in the same tick rank deterministically.
        let mut new_processes: Vec<_> = snapshot.into_iter().collect();
        new_processes.sort_unstable_by_key(|(pid, _)| *pid);
        for (pid, sample) in new_processes {
            self.histories
                .insert(pid, ProcessHistory::new(pid, sample, now, self.window_size));
            self.order.push(pid);
        }

        self.ticks += 1;
        debug!(
            target: "Monitor",
            "Tick {}: tracking {} processes, {:.0} KB resident",
            self.ticks,
            self.histories.len(),
            self.total_memory_usage
        );
        self.ticks
    }

    /// Tracked processes ranked by the window aggregate for `metric`, highest first.
    pub fn top_processes(&self, metric: Metric, limit: usize) -> Vec<&ProcessHistory> {
        let mut ranked: Vec<&ProcessHistory> = self
            .order
            .iter()
            .filter_map(|pid| self.histories.get(pid))
            .collect();
        // Stable sort keeps first-seen order among equal keys.
        ranked.sort_by(|a, b| b.sort_key_for(metric).total_cmp(&a.sort_key_for(metric)));
        ranked.truncate(limit);
        ranked
    }

    pub fn top_views(&self, metric: Metric, limit: usize) -> Vec<ProcessView> {
        self.top_processes(metric, limit)
            .into_iter()
            .map(|h| ProcessView::new(h, metric))
            .collect()
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessHistory> {
        self.histories.get(&pid)
    }

    pub fn process_count(&self) -> usize {
        self.histories.len()
    }

    pub fn total_memory_usage(&self) -> f64 {
        self.total_memory_usage
    }

    pub fn network_stats(&self) -> bool {
        self.network_stats
    }

    /// Only affects what future fetches ask for.
    pub fn set_network_stats(&mut self, enabled: bool) {
        if self.network_stats != enabled {
            info!(target: "Monitor", "Network stats {}", if enabled { "enabled" } else { "disabled" });
        }
        self.network_stats = enabled;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, true)
    }
}
