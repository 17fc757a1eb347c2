//! Wakefulness scoring.
//!
//! Combines the outcome of one wake encounter into a 0-100 score with a
//! per-dimension breakdown:
//!
//! | Dimension   | Range | Source                                   |
//! |-------------|-------|------------------------------------------|
//! | puzzle      | 0-50  | solve time beyond 20 s, wrong answers    |
//! | snooze      | 0-30  | step function of the snooze count        |
//! | consistency | 0-20  | distance from the scheduled trigger      |
//! | recall      | 0-10  | recall gate answered correctly           |
//!
//! The total is capped at 100 even though the components can add up to 110.

use serde::{Deserialize, Serialize};

const PUZZLE_MAX: i64 = 50;
const PUZZLE_GRACE_MS: u64 = 20_000;
const PUZZLE_SLOW_STEP_MS: u64 = 10_000;
const PUZZLE_SLOW_STEP_PENALTY: u64 = 5;
const PUZZLE_SLOW_PENALTY_CAP: u64 = 25;
const PUZZLE_ERROR_PENALTY: i64 = 10;
const RECALL_BONUS: u8 = 10;
const TOTAL_CAP: u8 = 100;

/// Everything the scorer looks at for one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub puzzle_time_ms: u64,
    pub puzzle_errors: u32,
    pub snooze_count: u32,
    /// Signed minutes from the scheduled trigger; positive = late.
    pub wake_delta_minutes: i64,
    pub recall_correct: Option<bool>,
}

/// Score breakdown. `total` is the capped sum of the four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeScore {
    pub puzzle: u8,
    pub snooze: u8,
    pub consistency: u8,
    pub recall: u8,
    pub total: u8,
}

/// Score one encounter. Total and deterministic.
pub fn score(inputs: &ScoreInputs) -> WakeScore {
    let puzzle = puzzle_component(inputs.puzzle_time_ms, inputs.puzzle_errors);
    let snooze = snooze_component(inputs.snooze_count);
    let consistency = consistency_component(inputs.wake_delta_minutes);
    let recall = recall_component(inputs.recall_correct);
    let total = (puzzle + snooze + consistency + recall).min(TOTAL_CAP);

    WakeScore {
        puzzle,
        snooze,
        consistency,
        recall,
        total,
    }
}

fn puzzle_component(time_ms: u64, errors: u32) -> u8 {
    let slow_penalty = if time_ms > PUZZLE_GRACE_MS {
        ((time_ms - PUZZLE_GRACE_MS) / PUZZLE_SLOW_STEP_MS)
            .saturating_mul(PUZZLE_SLOW_STEP_PENALTY)
            .min(PUZZLE_SLOW_PENALTY_CAP)
    } else {
        0
    };
    let error_penalty = PUZZLE_ERROR_PENALTY * errors as i64;
    (PUZZLE_MAX - slow_penalty as i64 - error_penalty).max(0) as u8
}

fn snooze_component(snooze_count: u32) -> u8 {
    match snooze_count {
        0 => 30,
        1 => 20,
        2 => 10,
        _ => 0,
    }
}

fn consistency_component(delta_minutes: i64) -> u8 {
    match delta_minutes.unsigned_abs() {
        0..=10 => 20,
        11..=20 => 10,
        _ => 0,
    }
}

fn recall_component(recall_correct: Option<bool>) -> u8 {
    match recall_correct {
        Some(true) => RECALL_BONUS,
        Some(false) | None => 0,
    }
}
