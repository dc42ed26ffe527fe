//! Display helpers for metric values and window histories.

use crate::proc::Metric;

const SPARK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const ABSENT_GLYPH: char = '_';

/// Human-readable form of one window value. Missing values render as `-`.
pub fn format_value(metric: Metric, value: Option<f64>) -> String {
    let Some(v) = value else {
        return "-".to_string();
    };
    match metric {
        // Rates are seconds of cpu per second; 1.0 is one full core.
        Metric::Cpu => format!("{:.1}%", v * 100.0),
        // KB.
        Metric::Memory => format!("{:.1} GB", v / 1e6),
        Metric::NetworkIn | Metric::NetworkOut => match v {
            v if v < 1e6 => format!("{:.0} kB", v / 1e3),
            v if v < 1e9 => format!("{:.0} MB", v / 1e6),
            v => format!("{:.0} GB", v / 1e9),
        },
    }
}

/// Scale one value for charting: CPU in cores clamped to `[0, 4]`, memory
/// relative to a quarter of `total_memory`, network in MB.
pub fn chart_value(metric: Metric, value: f64, total_memory: f64) -> f64 {
    match metric {
        Metric::Cpu => value.clamp(0.0, 4.0),
        Metric::Memory if total_memory > 0.0 => value / (total_memory / 4.0),
        Metric::Memory => 0.0,
        Metric::NetworkIn | Metric::NetworkOut => value / 1e6,
    }
}

/// [`chart_value`] over a whole history, with missing values as zero.
pub fn chart_values(metric: Metric, values: &[Option<f64>], total_memory: f64) -> Vec<f64> {
    values
        .iter()
        .map(|v| chart_value(metric, v.unwrap_or(0.0), total_memory))
        .collect()
}

/// Downsample a history into `num_bins` bins.
/// Use a dumb 'max' strategy that simply takes the maximum present value in each bin.
pub fn resample(values: &[Option<f64>], num_bins: usize) -> Vec<Option<f64>> {
    if values.is_empty() || num_bins == 0 {
        return Vec::new();
    }
    if values.len() <= num_bins {
        return values.to_vec();
    }

    let mut result = vec![None; num_bins];
    for (i, bin) in result.iter_mut().enumerate() {
        let start = i * values.len() / num_bins;
        let end = (i + 1) * values.len() / num_bins;
        *bin = values[start..end]
            .iter()
            .flatten()
            .copied()
            .reduce(f64::max);
    }
    result
}

/// A one-line chart of `history`, at most `width` glyphs wide.
///
/// Bars are scaled to the larger of one unit (one core, a quarter of total
/// memory, one MB) and the tallest value shown. Missing bins render as `_`.
pub fn sparkline(metric: Metric, history: &[Option<f64>], total_memory: f64, width: usize) -> String {
    let binned = resample(history, width);
    let scaled = chart_values(metric, &binned, total_memory);
    let top = scaled.iter().copied().fold(1.0, f64::max);
    binned
        .iter()
        .zip(scaled)
        .map(|(raw, v)| match raw {
            None => ABSENT_GLYPH,
            Some(_) => {
                let level = (v / top * (SPARK_GLYPHS.len() - 1) as f64).round();
                SPARK_GLYPHS[(level.max(0.0) as usize).min(SPARK_GLYPHS.len() - 1)]
            }
        })
        .collect()
}
