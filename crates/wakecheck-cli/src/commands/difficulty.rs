use chrono::NaiveTime;
use clap::{Subcommand, ValueEnum};
use serde_json::json;
use wakecheck_core::{dismiss_difficulty, snooze_difficulty, AlarmConfig, PuzzleMode};

use super::print_json;

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Auto,
    Manual,
}

impl From<ModeArg> for PuzzleMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => PuzzleMode::Auto,
            ModeArg::Manual => PuzzleMode::Manual,
        }
    }
}

#[derive(Subcommand)]
pub enum DifficultyAction {
    /// Level of the puzzle guarding a snooze
    Snooze {
        /// Snoozes so far in this episode
        snooze_count: u32,
    },
    /// Level of the puzzle guarding a dismissal
    Dismiss {
        /// Snoozes so far in this episode
        snooze_count: u32,
        #[arg(long, value_enum, default_value = "auto")]
        mode: ModeArg,
        /// Base level in manual mode (1-4)
        #[arg(long, default_value = "2")]
        manual_level: u8,
    },
}

pub fn run(action: DifficultyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DifficultyAction::Snooze { snooze_count } => {
            let level = snooze_difficulty(snooze_count);
            print_json(&json!({ "gate": "snooze", "snooze_count": snooze_count, "level": level }))
        }
        DifficultyAction::Dismiss {
            snooze_count,
            mode,
            manual_level,
        } => {
            let mut alarm = AlarmConfig::new("cli", NaiveTime::MIN);
            alarm.puzzle.mode = mode.into();
            alarm.puzzle.manual_difficulty = manual_level;
            alarm.validate()?;
            let level = dismiss_difficulty(&alarm, snooze_count);
            print_json(&json!({ "gate": "dismiss", "snooze_count": snooze_count, "level": level }))
        }
    }
}
