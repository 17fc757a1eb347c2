use clap::Args;
use wakecheck_core::{score, ScoreInputs};

use super::print_json;

#[derive(Args)]
pub struct ScoreArgs {
    /// Time spent on the dismiss puzzle in milliseconds
    #[arg(long)]
    puzzle_ms: u64,
    /// Wrong puzzle answers
    #[arg(long, default_value = "0")]
    errors: u32,
    /// Snoozes before the dismissal
    #[arg(long, default_value = "0")]
    snoozes: u32,
    /// Minutes between scheduled time and dismissal (negative = early)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    delta: i64,
    /// Recall answer correctness; omit if the recall gate did not run
    #[arg(long)]
    recall: Option<bool>,
}

pub fn run(args: ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = ScoreInputs {
        puzzle_time_ms: args.puzzle_ms,
        puzzle_errors: args.errors,
        snooze_count: args.snoozes,
        wake_delta_minutes: args.delta,
        recall_correct: args.recall,
    };
    print_json(&score(&inputs))
}
