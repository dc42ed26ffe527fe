use std::time::Instant;

use crate::{
    proc::stats::{Metric, Pid, ProcessSample},
    window::RateWindow,
};

/// Rolling history for one process, alive or recently dead.
///
/// The first sample only sets the baseline; every later sample turns the
/// difference from the previous one into a rate.
#[derive(Debug, Clone)]
pub struct ProcessHistory {
    pub pid: Pid,
    /// First-seen command, kept after the process exits.
    pub display_name: String,
    pub is_alive: bool,
    last_sample: ProcessSample,
    last_sample_time: Instant,
    cpu: RateWindow,
    memory: RateWindow,
    network_in: RateWindow,
    network_out: RateWindow,
}

impl ProcessHistory {
    pub fn new(pid: Pid, sample: ProcessSample, timestamp: Instant, window_size: usize) -> Self {
        Self {
            pid,
            display_name: sample.command.clone(),
            is_alive: true,
            last_sample: sample,
            last_sample_time: timestamp,
            cpu: RateWindow::new(window_size),
            memory: RateWindow::new(window_size),
            network_in: RateWindow::new(window_size),
            network_out: RateWindow::new(window_size),
        }
    }

    /// Record one tick. `None` means the pid was not in this tick's snapshot.
    ///
    /// A non-positive time delta records missing CPU and network values for
    /// the tick; memory is point-in-time and is recorded regardless.
    pub fn add_sample(&mut self, sample: Option<ProcessSample>, timestamp: Instant) {
        let Some(sample) = sample else {
            self.cpu.add(None);
            self.memory.add(None);
            self.network_in.add(None);
            self.network_out.add(None);
            self.is_alive = false;
            return;
        };

        // `Instant` subtraction saturates at zero, so clock anomalies land here too.
        let time_delta = timestamp
            .saturating_duration_since(self.last_sample_time)
            .as_secs_f64();
        let rates_defined = time_delta > 0.0;

        let cpu_rate = rates_defined
            .then(|| (sample.cpu_time_total - self.last_sample.cpu_time_total) / time_delta);
        self.cpu.add(cpu_rate);
        self.memory.add(Some(sample.memory_resident_set));

        let previous = &self.last_sample;
        let network = match (
            sample.network_bytes_in,
            sample.network_bytes_out,
            previous.network_bytes_in,
            previous.network_bytes_out,
        ) {
            (Some(bytes_in), Some(bytes_out), Some(prev_in), Some(prev_out)) if rates_defined => {
                // Counters occasionally step backwards; clamp rather than go negative.
                Some(((bytes_in - prev_in).max(0.0), (bytes_out - prev_out).max(0.0)))
            }
            _ => None,
        };
        self.network_in.add(network.map(|(bytes_in, _)| bytes_in));
        self.network_out.add(network.map(|(_, bytes_out)| bytes_out));

        self.last_sample = sample;
        self.last_sample_time = timestamp;
        self.is_alive = true;
    }

    fn window(&self, metric: Metric) -> &RateWindow {
        match metric {
            Metric::Cpu => &self.cpu,
            Metric::Memory => &self.memory,
            Metric::NetworkIn => &self.network_in,
            Metric::NetworkOut => &self.network_out,
        }
    }

    /// Window contents for `metric`, oldest first.
    pub fn values_for(&self, metric: Metric) -> Vec<Option<f64>> {
        self.window(metric).values()
    }

    pub fn sort_key_for(&self, metric: Metric) -> f64 {
        self.window(metric).aggregate()
    }

    pub fn current(&self, metric: Metric) -> Option<f64> {
        self.window(metric).latest()
    }

    pub fn last_sample(&self) -> &ProcessSample {
        &self.last_sample
    }

    /// Dead, and aged out of the CPU window.
    pub fn is_stale(&self) -> bool {
        !self.is_alive && self.cpu.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const EPSILON: f64 = 1e-9;

    fn sample(cpu_total: f64, rss: f64) -> ProcessSample {
        ProcessSample::new("proc", cpu_total, cpu_total, rss)
    }

    fn net(bytes_in: f64, bytes_out: f64) -> ProcessSample {
        sample(0.0, 100.0).with_network(bytes_in, bytes_out)
    }

    fn secs(start: Instant, s: u64) -> Instant {
        start + Duration::from_secs(s)
    }

    #[test]
    fn first_sample_is_only_a_baseline() {
        let now = Instant::now();
        let h = ProcessHistory::new(7, sample(10.0, 512.0), now, 4);
        assert!(h.is_alive);
        assert_eq!(h.display_name, "proc");
        for m in Metric::ALL {
            assert_eq!(h.values_for(m), vec![None; 4]);
            assert_eq!(h.sort_key_for(m), 0.0);
        }
    }

    #[test]
    fn cpu_rate_is_delta_over_elapsed_seconds() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, sample(10.0, 512.0), t0, 4);
        h.add_sample(Some(sample(12.0, 640.0)), secs(t0, 1));
        assert!((h.current(Metric::Cpu).unwrap() - 2.0).abs() < EPSILON);
        assert_eq!(h.current(Metric::Memory), Some(640.0));

        h.add_sample(Some(sample(13.0, 640.0)), secs(t0, 3));
        assert!((h.current(Metric::Cpu).unwrap() - 0.5).abs() < EPSILON);
        assert!((h.sort_key_for(Metric::Cpu) - 2.5).abs() < EPSILON);
    }

    #[test]
    fn network_deltas_clamp_regressions() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, net(1000.0, 50.0), t0, 3);
        h.add_sample(Some(net(990.0, 40.0)), secs(t0, 1));
        h.add_sample(Some(net(1050.0, 70.0)), secs(t0, 2));
        assert_eq!(
            h.values_for(Metric::NetworkIn),
            vec![None, Some(0.0), Some(60.0)]
        );
        assert_eq!(
            h.values_for(Metric::NetworkOut),
            vec![None, Some(0.0), Some(30.0)]
        );
        assert_eq!(h.sort_key_for(Metric::NetworkIn), 60.0);
    }

    #[test]
    fn network_needs_both_samples() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, sample(0.0, 100.0), t0, 3);
        h.add_sample(Some(net(500.0, 500.0)), secs(t0, 1));
        h.add_sample(Some(sample(0.0, 100.0)), secs(t0, 2));
        h.add_sample(Some(net(900.0, 600.0)), secs(t0, 3));
        assert_eq!(h.values_for(Metric::NetworkIn), vec![None; 3]);
        h.add_sample(Some(net(950.0, 610.0)), secs(t0, 4));
        assert_eq!(h.current(Metric::NetworkIn), Some(50.0));
        assert_eq!(h.current(Metric::NetworkOut), Some(10.0));
    }

    #[test]
    fn zero_time_delta_records_missing_rates() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, net(0.0, 0.0), t0, 3);
        h.add_sample(Some(net(10.0, 10.0)), t0);
        assert_eq!(h.current(Metric::Cpu), None);
        assert_eq!(h.current(Metric::NetworkIn), None);
        assert_eq!(h.current(Metric::Memory), Some(100.0));
        assert!(h.is_alive);

        // The baseline still moved forward.
        h.add_sample(Some(net(15.0, 12.0)), secs(t0, 1));
        assert_eq!(h.current(Metric::NetworkIn), Some(5.0));
        assert_eq!(h.current(Metric::NetworkOut), Some(2.0));
    }

    #[test]
    fn missing_sample_marks_dead_and_keeps_baseline() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, sample(10.0, 512.0), t0, 3);
        h.add_sample(Some(sample(11.0, 512.0)), secs(t0, 1));
        h.add_sample(None, secs(t0, 2));
        assert!(!h.is_alive);
        assert!(!h.is_stale());
        assert_eq!(h.last_sample().cpu_time_total, 11.0);
        for m in Metric::ALL {
            assert_eq!(h.current(m), None);
        }

        // Reappearing resumes from the retained baseline.
        h.add_sample(Some(sample(14.0, 512.0)), secs(t0, 4));
        assert!(h.is_alive);
        assert!((h.current(Metric::Cpu).unwrap() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn stale_once_cpu_window_ages_out() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, sample(0.0, 1.0), t0, 3);
        h.add_sample(Some(sample(1.0, 1.0)), secs(t0, 1));
        h.add_sample(None, secs(t0, 2));
        assert!(!h.is_stale());
        h.add_sample(None, secs(t0, 3));
        assert!(!h.is_stale());
        h.add_sample(None, secs(t0, 4));
        assert!(h.is_stale());
    }

    #[test]
    fn never_rated_process_is_stale_on_first_absence() {
        let t0 = Instant::now();
        let mut h = ProcessHistory::new(1, sample(0.0, 1.0), t0, 60);
        h.add_sample(None, secs(t0, 1));
        assert!(h.is_stale());
    }
}
