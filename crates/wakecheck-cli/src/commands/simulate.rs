//! Runs one real ringing episode against the local store with scripted
//! answers standing in for the user.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use serde_json::json;
use wakecheck_core::error::Result as CoreResult;
use wakecheck_core::{
    CameraHeartRateCheck, Collaborators, Config, DifficultyLevel, DismissalOrchestrator,
    EpisodeTrigger, HeartRateEstimate, HeartRateSubsystem, PuzzleOutcome, PuzzleSubsystem,
    RecallItem, RecallOutcome, RecallSubsystem, ReplaySource, SystemClock,
};

use super::hr::load_capture;
use super::{open_store, print_json};
use crate::scheduler::KvScheduler;

#[derive(Subcommand)]
pub enum SimulateAction {
    /// Snooze the ringing alarm
    Snooze(EpisodeArgs),
    /// Dismiss the ringing alarm through every enabled gate
    Dismiss(EpisodeArgs),
}

#[derive(Args)]
pub struct EpisodeArgs {
    /// Alarm ID
    #[arg(long)]
    alarm: String,
    /// Snoozes already taken in this wake-up
    #[arg(long, default_value = "0")]
    snoozes: u32,
    /// Minutes since the scheduled trigger (negative = early)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    late_min: i64,
    /// Time the scripted user needs for the puzzle
    #[arg(long, default_value = "15000")]
    puzzle_ms: u64,
    /// Wrong answers before solving the puzzle
    #[arg(long, default_value = "0")]
    errors: u32,
    /// Whether the recall answer is correct
    #[arg(long, default_value = "true")]
    recall: bool,
    /// PPG capture replayed through the heart-rate gate
    #[arg(long)]
    hr_file: Option<PathBuf>,
}

struct ScriptedPuzzle(PuzzleOutcome);

#[async_trait]
impl PuzzleSubsystem for ScriptedPuzzle {
    async fn present(&self, _level: DifficultyLevel) -> CoreResult<PuzzleOutcome> {
        Ok(self.0)
    }
}

struct ScriptedRecall(bool);

#[async_trait]
impl RecallSubsystem for ScriptedRecall {
    async fn present(&self, _items: &[RecallItem]) -> CoreResult<RecallOutcome> {
        Ok(RecallOutcome { correct: self.0 })
    }
}

/// Heart-rate gate with no camera attached.
struct NoCamera;

#[async_trait]
impl HeartRateSubsystem for NoCamera {
    async fn measure(&self) -> CoreResult<Option<HeartRateEstimate>> {
        Ok(None)
    }
}

pub fn run(action: SimulateAction) -> Result<(), Box<dyn std::error::Error>> {
    let (snooze, args) = match action {
        SimulateAction::Snooze(args) => (true, args),
        SimulateAction::Dismiss(args) => (false, args),
    };

    let config = Config::load()?;
    let db = Arc::new(open_store()?);
    let heart_rate: Arc<dyn HeartRateSubsystem> = match &args.hr_file {
        Some(path) => Arc::new(CameraHeartRateCheck::with_measurement_samples(
            ReplaySource::new(load_capture(path)?),
            config.heart_rate.measurement_samples as usize,
        )),
        None => Arc::new(NoCamera),
    };
    let collaborators = Collaborators {
        storage: db.clone(),
        scheduler: Arc::new(KvScheduler::new(db.clone())),
        puzzle: Arc::new(ScriptedPuzzle(PuzzleOutcome {
            errors: args.errors,
            time_ms: args.puzzle_ms,
        })),
        heart_rate,
        recall: Arc::new(ScriptedRecall(args.recall)),
        clock: Arc::new(SystemClock),
    };

    let trigger = if args.snoozes == 0 {
        EpisodeTrigger::Scheduled
    } else {
        EpisodeTrigger::SnoozeReminder {
            snooze_count: args.snoozes,
        }
    };
    let scheduled_at = Utc::now() - Duration::minutes(args.late_min);
    let orchestrator =
        DismissalOrchestrator::ring_stored(&args.alarm, scheduled_at, trigger, collaborators)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        if snooze {
            orchestrator.request_snooze().await
        } else {
            orchestrator.request_dismiss().await
        }
    });

    match result {
        Ok(outcome) => print_json(&json!({
            "events": orchestrator.events(),
            "outcome": outcome,
        })),
        Err(e) => {
            print_json(&json!({ "events": orchestrator.events() }))?;
            Err(e.into())
        }
    }
}
