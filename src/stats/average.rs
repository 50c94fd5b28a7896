//! Rolling average over the last N samples

use std::collections::VecDeque;

/// Moving average with a fixed window
#[derive(Debug, Clone)]
pub struct RollingAverage {
    samples: VecDeque<f64>,
    window: usize,
    total: f64,
}

impl RollingAverage {
    /// Create an average over `window` samples (at least one)
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            total: 0.0,
        }
    }

    /// Add a sample and return the updated average
    pub fn push(&mut self, sample: f64) -> f64 {
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.samples.push_back(sample);
        self.total += sample;
        self.value()
    }

    /// Current average, 0 before the first sample
    pub fn value(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.total / self.samples.len() as f64
        }
    }

    /// Samples currently averaged
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forget all samples
    pub fn clear(&mut self) {
        self.samples.clear();
        self.total = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_fills_then_rolls() {
        let mut avg = RollingAverage::new(3);
        assert_eq!(avg.value(), 0.0);

        assert_eq!(avg.push(3.0), 3.0);
        assert_eq!(avg.push(6.0), 4.5);
        assert_eq!(avg.push(9.0), 6.0);
        // 3.0 drops out.
        assert_eq!(avg.push(12.0), 9.0);
        assert_eq!(avg.len(), 3);
    }

    #[test]
    fn test_zero_window_acts_as_one() {
        let mut avg = RollingAverage::new(0);
        avg.push(1.0);
        assert_eq!(avg.push(5.0), 5.0);
    }

    #[test]
    fn test_clear() {
        let mut avg = RollingAverage::new(4);
        avg.push(2.0);
        avg.clear();
        assert!(avg.is_empty());
        assert_eq!(avg.value(), 0.0);
    }
}
