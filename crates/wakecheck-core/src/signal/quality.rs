use serde::{Deserialize, Serialize};

/// Average intensity above which a fingertip is assumed to cover the lens.
const FINGER_PRESENT_THRESHOLD: f64 = 100.0;

/// Signal quality shown to the user while measuring. Feedback only; it
/// never gates a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    pub fn from_intensity(avg_intensity: f64) -> Self {
        if avg_intensity < 80.0 {
            QualityTier::Poor
        } else if avg_intensity < 120.0 {
            QualityTier::Fair
        } else if avg_intensity < 180.0 {
            QualityTier::Good
        } else {
            QualityTier::Excellent
        }
    }
}

pub fn is_finger_present(avg_intensity: f64) -> bool {
    avg_intensity > FINGER_PRESENT_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(QualityTier::from_intensity(0.0), QualityTier::Poor);
        assert_eq!(QualityTier::from_intensity(79.9), QualityTier::Poor);
        assert_eq!(QualityTier::from_intensity(80.0), QualityTier::Fair);
        assert_eq!(QualityTier::from_intensity(120.0), QualityTier::Good);
        assert_eq!(QualityTier::from_intensity(179.9), QualityTier::Good);
        assert_eq!(QualityTier::from_intensity(180.0), QualityTier::Excellent);
    }

    #[test]
    fn finger_presence_is_strict() {
        assert!(!is_finger_present(100.0));
        assert!(is_finger_present(100.5));
    }
}
