use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::buffer::PpgSample;
use super::processor::{HeartRateEstimate, SignalProcessor};
use crate::collaborators::{HeartRateSubsystem, SampleSource};
use crate::error::Result;

/// Finger-covered samples per measurement: about 10 s at 30 samples/s.
pub const DEFAULT_MEASUREMENT_SAMPLES: usize = 300;

/// Heart-rate gate backed by a camera sample stream.
///
/// Each `measure()` starts a fresh [`SignalProcessor`], so nothing leaks
/// between measurements. Samples only count towards the measurement while
/// the window average says a finger covers the lens.
pub struct CameraHeartRateCheck<S> {
    source: Mutex<S>,
    measurement_samples: usize,
}

impl<S: SampleSource> CameraHeartRateCheck<S> {
    pub fn new(source: S) -> Self {
        Self::with_measurement_samples(source, DEFAULT_MEASUREMENT_SAMPLES)
    }

    pub fn with_measurement_samples(source: S, measurement_samples: usize) -> Self {
        Self {
            source: Mutex::new(source),
            measurement_samples: measurement_samples.max(1),
        }
    }
}

#[async_trait]
impl<S: SampleSource> HeartRateSubsystem for CameraHeartRateCheck<S> {
    async fn measure(&self) -> Result<Option<HeartRateEstimate>> {
        let mut source = self.source.lock().await;
        let mut processor = SignalProcessor::new();
        let mut latest: Option<HeartRateEstimate> = None;
        let mut accepted = 0usize;
        let mut skipped = 0usize;

        while accepted < self.measurement_samples {
            let Some(sample) = source.next_sample().await? else {
                break;
            };
            // the processor assumes an unbroken 30/s stream
            let reading = processor.ingest(sample.intensity, sample.timestamp_ms);
            if !processor.finger_present() {
                skipped += 1;
                continue;
            }
            accepted += 1;

            // most recent estimate wins
            if let Some(estimate) = reading.estimate() {
                latest = Some(estimate);
            }
        }

        debug!(accepted, skipped, bpm = ?latest.map(|b| b.bpm), "heart-rate measurement finished");
        Ok(latest)
    }
}

/// Replays recorded samples, e.g. from a CSV capture.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    samples: VecDeque<PpgSample>,
}

impl ReplaySource {
    pub fn new(samples: impl IntoIterator<Item = PpgSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_sample(&mut self) -> Result<Option<PpgSample>> {
        Ok(self.samples.pop_front())
    }
}
