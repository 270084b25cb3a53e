//! Rolling-window storage for the telemetry charts
//!
//! Each chart holds a fixed number of points; pushing past capacity drops
//! the oldest label and the oldest value of every series in lockstep, so
//! all series of one chart stay index-aligned.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of points retained per chart.
pub const CHART_WINDOW: usize = 20;

/// One tick of the stats subscription, already scaled for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    pub cpu_pct: f64,
    pub mem_used_mb: f64,
    pub mem_limit_mb: f64,
    pub net_rx_mb: f64,
    pub net_tx_mb: f64,
    pub disk_read_mb: f64,
    pub disk_write_mb: f64,
}

/// A label column plus one or more value series with a shared capacity.
/// Oldest points are dropped when capacity is exceeded.
#[derive(Clone, Debug)]
pub struct ChartBuffer {
    cap: usize,
    labels: VecDeque<String>,
    series: Vec<VecDeque<f64>>,
}

impl ChartBuffer {
    /// Create a buffer with `series_count` aligned series.
    pub fn new(series_count: usize, cap: usize) -> Self {
        Self {
            cap,
            labels: VecDeque::with_capacity(cap),
            series: (0..series_count)
                .map(|_| VecDeque::with_capacity(cap))
                .collect(),
        }
    }

    /// Append one label and one value per series, evicting the oldest
    /// point everywhere once past capacity. Extra values are ignored and
    /// missing values push nothing into their series, mirroring the
    /// per-series append of the chart widget.
    pub fn push(&mut self, label: impl Into<String>, values: &[f64]) {
        self.labels.push_back(label.into());
        for (i, series) in self.series.iter_mut().enumerate() {
            if let Some(v) = values.get(i) {
                series.push_back(*v);
            }
        }
        while self.labels.len() > self.cap {
            self.labels.pop_front();
            for series in self.series.iter_mut() {
                series.pop_front();
            }
        }
    }

    /// Clear all labels and series, keeping capacity.
    pub fn reset(&mut self) {
        self.labels.clear();
        for series in self.series.iter_mut() {
            series.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|s| s.as_str())
    }

    /// Points of one series as (index, value) pairs for Chart rendering.
    pub fn points(&self, series_idx: usize) -> Vec<(f64, f64)> {
        match self.series.get(series_idx) {
            Some(s) => s
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64, *v))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Most recent value of one series, if any.
    pub fn latest(&self, series_idx: usize) -> Option<f64> {
        self.series.get(series_idx).and_then(|s| s.back().copied())
    }

    /// Largest value across all series, for y-axis bounds.
    pub fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.iter().copied())
            .fold(0.0_f64, f64::max)
    }
}

/// The four chart buffers of one selection. Reset (not rebuilt) whenever
/// a new container is selected.
#[derive(Clone, Debug)]
pub struct ChartSet {
    pub cpu: ChartBuffer,
    pub mem: ChartBuffer,
    pub net: ChartBuffer,
    pub disk: ChartBuffer,
}

impl ChartSet {
    pub fn new(cap: usize) -> Self {
        Self {
            cpu: ChartBuffer::new(1, cap),
            mem: ChartBuffer::new(1, cap),
            net: ChartBuffer::new(2, cap),
            disk: ChartBuffer::new(2, cap),
        }
    }

    /// Push one stats sample across all four charts under one label.
    pub fn push_sample(&mut self, label: &str, sample: &StatsSample) {
        self.cpu.push(label, &[sample.cpu_pct]);
        self.mem.push(label, &[sample.mem_used_mb]);
        self.net.push(label, &[sample.net_rx_mb, sample.net_tx_mb]);
        self.disk
            .push(label, &[sample.disk_read_mb, sample.disk_write_mb]);
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.mem.reset();
        self.net.reset();
        self.disk.reset();
    }
}

impl Default for ChartSet {
    fn default() -> Self {
        Self::new(CHART_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_capacity() {
        let mut b = ChartBuffer::new(1, 3);
        b.push("a", &[10.0]);
        b.push("b", &[20.0]);
        b.push("c", &[30.0]);
        assert_eq!(b.len(), 3);

        b.push("d", &[40.0]);
        assert_eq!(b.len(), 3);
        assert_eq!(b.labels().collect::<Vec<_>>(), vec!["b", "c", "d"]);
        assert_eq!(b.points(0), vec![(0.0, 20.0), (1.0, 30.0), (2.0, 40.0)]);
    }

    #[test]
    fn test_series_stay_index_aligned() {
        let mut b = ChartBuffer::new(2, 2);
        b.push("a", &[1.0, 10.0]);
        b.push("b", &[2.0, 20.0]);
        b.push("c", &[3.0, 30.0]);

        assert_eq!(b.labels().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(b.points(0), vec![(0.0, 2.0), (1.0, 3.0)]);
        assert_eq!(b.points(1), vec![(0.0, 20.0), (1.0, 30.0)]);
    }

    #[test]
    fn test_retains_exactly_last_n_for_long_sequences() {
        for cap in [1usize, 5, 20] {
            let mut b = ChartBuffer::new(1, cap);
            let total = cap * 3 + 7;
            for i in 0..total {
                b.push(format!("t{}", i), &[i as f64]);
            }
            assert_eq!(b.len(), cap);
            let expected: Vec<String> =
                (total - cap..total).map(|i| format!("t{}", i)).collect();
            assert_eq!(b.labels().collect::<Vec<_>>(), expected);
            assert_eq!(b.latest(0), Some((total - 1) as f64));
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut b = ChartBuffer::new(2, 4);
        b.push("a", &[1.0, 2.0]);
        b.push("b", &[3.0, 4.0]);
        b.reset();
        assert!(b.is_empty());
        assert_eq!(b.points(0), Vec::<(f64, f64)>::new());
        assert_eq!(b.cap(), 4);
    }

    #[test]
    fn test_max_value_across_series() {
        let mut b = ChartBuffer::new(2, 4);
        b.push("a", &[1.0, 9.0]);
        b.push("b", &[5.0, 2.0]);
        assert_eq!(b.max_value(), 9.0);

        let empty = ChartBuffer::new(1, 4);
        assert_eq!(empty.max_value(), 0.0);
    }

    #[test]
    fn test_chart_set_push_sample() {
        let mut charts = ChartSet::new(2);
        let sample = StatsSample {
            cpu_pct: 42.0,
            mem_used_mb: 128.0,
            mem_limit_mb: 512.0,
            net_rx_mb: 1.5,
            net_tx_mb: 0.5,
            disk_read_mb: 3.0,
            disk_write_mb: 4.0,
        };
        charts.push_sample("10:00:00", &sample);

        assert_eq!(charts.cpu.latest(0), Some(42.0));
        assert_eq!(charts.mem.latest(0), Some(128.0));
        assert_eq!(charts.net.latest(0), Some(1.5));
        assert_eq!(charts.net.latest(1), Some(0.5));
        assert_eq!(charts.disk.latest(0), Some(3.0));
        assert_eq!(charts.disk.latest(1), Some(4.0));

        charts.reset();
        assert!(charts.cpu.is_empty());
        assert!(charts.disk.is_empty());
    }
}
