use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use wakecheck_core::{PpgSample, SignalProcessor, ASSUMED_SAMPLE_RATE_HZ};

use super::print_json;

const CSV_HEADER: &str = "intensity,timestamp_ms";
const SYNTH_BASELINE: f64 = 150.0;
const SYNTH_AMPLITUDE: f64 = 25.0;

#[derive(Subcommand)]
pub enum HrAction {
    /// Estimate heart rate from an `intensity,timestamp_ms` capture
    Analyze {
        /// CSV capture file
        file: PathBuf,
    },
    /// Print a synthetic fingertip capture as CSV
    Synth {
        #[arg(long, default_value = "72")]
        bpm: f64,
        #[arg(long, default_value = "10")]
        seconds: u32,
        /// Peak amplitude of uniform noise added to each sample
        #[arg(long, default_value = "0")]
        noise: f64,
        /// RNG seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,
    },
}

pub fn run(action: HrAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        HrAction::Analyze { file } => {
            let samples = load_capture(&file)?;
            let mut processor = SignalProcessor::new();
            let mut reading = None;
            for sample in &samples {
                reading = Some(processor.ingest(sample.intensity, sample.timestamp_ms));
            }
            print_json(&json!({
                "samples": samples.len(),
                "reading": reading,
                "finger_present": processor.finger_present(),
                "quality": processor.quality(),
                "peaks": processor.peak_timestamps().len(),
            }))
        }
        HrAction::Synth {
            bpm,
            seconds,
            noise,
            seed,
        } => {
            if bpm.is_nan() || bpm <= 0.0 {
                return Err(format!("bpm must be positive, got {bpm}").into());
            }
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            println!("{CSV_HEADER}");
            for sample in synth_samples(bpm, seconds, noise, &mut rng) {
                println!("{:.3},{}", sample.intensity, sample.timestamp_ms);
            }
            Ok(())
        }
    }
}

/// Read a CSV capture from disk.
pub fn load_capture(path: &Path) -> Result<Vec<PpgSample>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(parse_capture(&content)?)
}

/// Parse `intensity,timestamp_ms` lines. Blank lines, `#` comments and the
/// header row are skipped.
pub fn parse_capture(content: &str) -> Result<Vec<PpgSample>, String> {
    let mut samples = Vec::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line == CSV_HEADER {
            continue;
        }
        let (intensity, timestamp) = line
            .split_once(',')
            .ok_or_else(|| format!("line {}: expected 'intensity,timestamp_ms'", n + 1))?;
        let intensity = intensity
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("line {}: bad intensity: {e}", n + 1))?;
        let timestamp_ms = timestamp
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("line {}: bad timestamp: {e}", n + 1))?;
        samples.push(PpgSample {
            intensity,
            timestamp_ms,
        });
    }
    Ok(samples)
}

/// Cosine pulse at `bpm` sampled at the processor's assumed rate.
pub fn synth_samples(bpm: f64, seconds: u32, noise: f64, rng: &mut impl Rng) -> Vec<PpgSample> {
    let count = (f64::from(seconds) * ASSUMED_SAMPLE_RATE_HZ) as usize;
    let period = ASSUMED_SAMPLE_RATE_HZ * 60.0 / bpm;
    let noise = noise.abs();
    (0..count)
        .map(|i| {
            let jitter = if noise > 0.0 {
                rng.gen_range(-noise..=noise)
            } else {
                0.0
            };
            PpgSample {
                intensity: SYNTH_BASELINE
                    + SYNTH_AMPLITUDE * (2.0 * PI * i as f64 / period).cos()
                    + jitter,
                timestamp_ms: (i as f64 * 1000.0 / ASSUMED_SAMPLE_RATE_HZ).round() as i64,
            }
        })
        .collect()
}
