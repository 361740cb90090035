//! Update duration history of a system.

/// Fixed-size ring of the most recent update durations.
#[derive(Clone, Debug)]
pub struct SystemPerf {
    history: Vec<f64>,
    cursor: usize,
    update_count: u64,
    last_ms: f64,
    sum_ms: f64,
}

impl SystemPerf {
    /// Creates an empty history holding up to `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![0.0; capacity.max(1)],
            cursor: 0,
            update_count: 0,
            last_ms: 0.0,
            sum_ms: 0.0,
        }
    }

    /// Records one update duration.
    pub fn record(&mut self, ms: f64) {
        self.history[self.cursor] = ms;
        self.cursor = (self.cursor + 1) % self.history.len();
        self.update_count += 1;
        self.last_ms = ms;
        self.sum_ms += ms;
    }

    /// Number of recorded updates since creation.
    #[must_use]
    pub const fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Duration of the last update, `-1.0` if none was recorded.
    #[must_use]
    pub fn last_ms(&self) -> f64 {
        if self.update_count == 0 {
            -1.0
        } else {
            self.last_ms
        }
    }

    /// Sum of all recorded durations.
    #[must_use]
    pub const fn sum_ms(&self) -> f64 {
        self.sum_ms
    }

    /// Maximum number of samples kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    /// Average of the last `count` samples, `-1.0` if fewer are available.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn last_avg_ms(&self, count: usize) -> f64 {
        let available = usize::try_from(self.update_count).map_or(self.history.len(), |n| n.min(self.history.len()));
        if count == 0 || count > available {
            return -1.0;
        }
        let len = self.history.len();
        let sum: f64 = (1..=count).map(|back| self.history[(self.cursor + len - back) % len]).sum();
        sum / count as f64
    }
}

impl Default for SystemPerf {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_needs_enough_samples() {
        let mut perf = SystemPerf::new(4);
        assert_eq!(perf.last_avg_ms(1), -1.0);
        assert_eq!(perf.last_ms(), -1.0);
        perf.record(2.0);
        perf.record(4.0);
        assert_eq!(perf.last_avg_ms(2), 3.0);
        assert_eq!(perf.last_avg_ms(3), -1.0);
    }

    #[test]
    fn test_ring_wraps() {
        let mut perf = SystemPerf::new(3);
        for ms in [1.0, 2.0, 3.0, 4.0, 5.0] {
            perf.record(ms);
        }
        assert_eq!(perf.update_count(), 5);
        assert_eq!(perf.last_ms(), 5.0);
        assert_eq!(perf.last_avg_ms(3), 4.0);
        assert_eq!(perf.last_avg_ms(4), -1.0);
        assert_eq!(perf.sum_ms(), 15.0);
    }
}
