//! Fingertip PPG heart-rate estimation.

mod buffer;
mod measurement;
mod processor;
mod quality;

pub use buffer::{PpgSample, SampleBuffer, DEFAULT_CAPACITY};
pub use measurement::{CameraHeartRateCheck, ReplaySource, DEFAULT_MEASUREMENT_SAMPLES};
pub use processor::{
    HeartRateEstimate, PpgReading, SignalProcessor, ASSUMED_SAMPLE_RATE_HZ, MIN_SAMPLES,
};
pub use quality::{is_finger_present, QualityTier};
