//! Puzzle difficulty policy.
//!
//! Maps the snooze count of the current episode (and, for dismissal, the
//! alarm's puzzle mode) to a level in `1..=4`. Snoozing repeatedly raises
//! both paths, and dismissal is never easier than snoozing at the same
//! count in auto mode.
//!
//! ```text
//! snoozes   0  1  2  3  4  5  6
//! snooze    1  1  2  3  4  4  4
//! dismiss   2  2  3  3  4  4  4   (auto)
//! ```

use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmConfig, PuzzleMode};

/// Base level used for dismissal when the alarm is in auto mode.
const AUTO_DISMISS_BASE: u8 = 2;

/// Puzzle difficulty, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DifficultyLevel(u8);

impl DifficultyLevel {
    pub const MIN: DifficultyLevel = DifficultyLevel(1);
    pub const MAX: DifficultyLevel = DifficultyLevel(4);

    /// Clamp any value into the valid range.
    pub fn clamped(value: u32) -> Self {
        DifficultyLevel(value.clamp(Self::MIN.0 as u32, Self::MAX.0 as u32) as u8)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl From<DifficultyLevel> for u8 {
    fn from(level: DifficultyLevel) -> Self {
        level.0
    }
}

impl TryFrom<u8> for DifficultyLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(DifficultyLevel(value))
        } else {
            Err(format!("difficulty level must be 1-4, got {value}"))
        }
    }
}

impl std::fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Difficulty of the puzzle that guards a snooze.
pub fn snooze_difficulty(snooze_count: u32) -> DifficultyLevel {
    match snooze_count {
        0 | 1 => DifficultyLevel::clamped(1),
        2 => DifficultyLevel::clamped(2),
        n => DifficultyLevel::clamped(n),
    }
}

/// Difficulty of the puzzle that guards a dismissal.
pub fn dismiss_difficulty(alarm: &AlarmConfig, snooze_count: u32) -> DifficultyLevel {
    let base = match alarm.puzzle.mode {
        PuzzleMode::Auto => AUTO_DISMISS_BASE as u32,
        PuzzleMode::Manual => alarm.puzzle.manual_difficulty as u32,
    };
    DifficultyLevel::clamped(base.saturating_add(snooze_count / 2))
}
