//! Heart-rate estimation from fingertip brightness.
//!
//! Each `ingest()` call appends one sample and re-runs the whole pipeline
//! over the rolling buffer:
//!
//! ```text
//! buffer (<=240) -> moving average (+-5) -> peak scan -> intervals -> BPM
//!                                                      \-> CV -> confidence
//! ```
//!
//! The capture rate is assumed to be 30 samples/s; timestamps are kept for
//! the peak history but do not enter the BPM computation.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::buffer::{PpgSample, SampleBuffer};
use super::quality::{is_finger_present, QualityTier};

/// Samples required before any estimate is attempted.
pub const MIN_SAMPLES: usize = 20;
pub const ASSUMED_SAMPLE_RATE_HZ: f64 = 30.0;

const SMOOTHING_RADIUS: usize = 5;
const PEAK_THRESHOLD_RATIO: f64 = 0.6;
/// 15 samples at 30/s caps detection at 120 BPM.
const MIN_PEAK_SPACING: usize = 15;
const PLAUSIBLE_BPM: RangeInclusive<f64> = 40.0..=200.0;

/// A heart rate the processor is willing to report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateEstimate {
    pub bpm: f64,
    /// 0-100, higher when beat intervals are regular.
    pub confidence: f64,
}

/// Result of one `ingest()` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpgReading {
    /// `None` until enough regular peaks have been seen.
    pub heart_rate_bpm: Option<f64>,
    pub confidence: f64,
    pub progress_pct: f64,
}

impl PpgReading {
    pub fn estimate(&self) -> Option<HeartRateEstimate> {
        self.heart_rate_bpm.map(|bpm| HeartRateEstimate {
            bpm,
            confidence: self.confidence,
        })
    }
}

/// Rolling PPG processor for one measurement session.
#[derive(Debug, Clone, Default)]
pub struct SignalProcessor {
    buffer: SampleBuffer,
    peak_timestamps: Vec<i64>,
}

impl SignalProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all samples and peak history.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.peak_timestamps.clear();
    }

    /// Append one sample and re-estimate.
    ///
    /// Non-finite intensities are not buffered; the reading then reflects
    /// the samples already held.
    pub fn ingest(&mut self, intensity: f64, timestamp_ms: i64) -> PpgReading {
        if intensity.is_finite() {
            self.buffer.push(PpgSample {
                intensity,
                timestamp_ms,
            });
        }
        self.evaluate()
    }

    pub fn sample_count(&self) -> usize {
        self.buffer.len()
    }

    /// Timestamps of the peaks accepted by the latest scan.
    pub fn peak_timestamps(&self) -> &[i64] {
        &self.peak_timestamps
    }

    pub fn average_intensity(&self) -> Option<f64> {
        self.buffer.average_intensity()
    }

    pub fn finger_present(&self) -> bool {
        self.average_intensity().is_some_and(is_finger_present)
    }

    pub fn quality(&self) -> Option<QualityTier> {
        self.average_intensity().map(QualityTier::from_intensity)
    }

    fn evaluate(&mut self) -> PpgReading {
        let len = self.buffer.len();
        let progress_pct = (len as f64 * 100.0 / MIN_SAMPLES as f64).min(100.0);

        if len < MIN_SAMPLES {
            self.peak_timestamps.clear();
            return PpgReading {
                heart_rate_bpm: None,
                confidence: 0.0,
                progress_pct,
            };
        }

        let smoothed = moving_average(&self.buffer.intensities(), SMOOTHING_RADIUS);
        let peaks = detect_peaks(&smoothed);
        self.peak_timestamps = peaks
            .iter()
            .filter_map(|&i| self.buffer.get(i).map(|s| s.timestamp_ms))
            .collect();

        match estimate_from_peaks(&peaks) {
            Some(estimate) => PpgReading {
                heart_rate_bpm: Some(estimate.bpm),
                confidence: estimate.confidence,
                progress_pct,
            },
            None => PpgReading {
                heart_rate_bpm: None,
                confidence: 0.0,
                progress_pct,
            },
        }
    }
}

/// Centered moving average; the window is truncated at both ends.
fn moving_average(values: &[f64], radius: usize) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for v in values {
        prefix.push(prefix[prefix.len() - 1] + v);
    }

    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(values.len() - 1);
            (prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64
        })
        .collect()
}

fn detect_peaks(smoothed: &[f64]) -> Vec<usize> {
    let len = smoothed.len();
    if len < 5 {
        return Vec::new();
    }

    let mean = smoothed.iter().sum::<f64>() / len as f64;
    let max = smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = mean + PEAK_THRESHOLD_RATIO * (max - mean);

    let mut peaks: Vec<usize> = Vec::new();
    for i in 2..len - 2 {
        let v = smoothed[i];
        let is_local_max = v > smoothed[i - 1]
            && v > smoothed[i - 2]
            && v > smoothed[i + 1]
            && v > smoothed[i + 2];
        if !is_local_max || v <= threshold {
            continue;
        }
        if peaks.last().is_some_and(|&prev| i - prev < MIN_PEAK_SPACING) {
            continue;
        }
        peaks.push(i);
    }
    peaks
}

fn estimate_from_peaks(peaks: &[usize]) -> Option<HeartRateEstimate> {
    if peaks.len() < 2 {
        return None;
    }

    let intervals: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let bpm = 60.0 / (mean / ASSUMED_SAMPLE_RATE_HZ);
    if !PLAUSIBLE_BPM.contains(&bpm) {
        return None;
    }

    let variance = intervals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
    let cv = variance.sqrt() / mean;
    let confidence = ((1.0 - cv) * 100.0).clamp(0.0, 100.0);

    Some(HeartRateEstimate { bpm, confidence })
}
