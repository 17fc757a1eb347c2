use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Samples kept by default: about 8 s at 30 samples/s.
pub const DEFAULT_CAPACITY: usize = 240;

/// One brightness sample from the covered camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpgSample {
    pub intensity: f64,
    pub timestamp_ms: i64,
}

/// FIFO of recent samples. Never holds more than `capacity` entries.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<PpgSample>,
    capacity: usize,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once full.
    pub fn push(&mut self, sample: PpgSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&PpgSample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PpgSample> {
        self.samples.iter()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.intensity).collect()
    }

    pub fn average_intensity(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.intensity).sum();
        Some(sum / self.samples.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: i64) -> PpgSample {
        PpgSample {
            intensity: i as f64,
            timestamp_ms: i * 33,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut buf = SampleBuffer::with_capacity(3);
        for i in 0..5 {
            buf.push(sample(i));
            assert!(buf.len() <= 3);
        }
        assert_eq!(buf.intensities(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn default_capacity_holds_eight_seconds() {
        let mut buf = SampleBuffer::default();
        for i in 0..1000 {
            buf.push(sample(i));
        }
        assert_eq!(buf.len(), DEFAULT_CAPACITY);
        assert_eq!(buf.get(0).unwrap().timestamp_ms, 760 * 33);
    }

    #[test]
    fn average_of_empty_is_none() {
        let mut buf = SampleBuffer::default();
        assert_eq!(buf.average_intensity(), None);
        buf.push(sample(10));
        buf.push(sample(20));
        assert_eq!(buf.average_intensity(), Some(15.0));
        buf.clear();
        assert!(buf.is_empty());
    }
}
