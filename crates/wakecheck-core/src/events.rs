use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::difficulty::DifficultyLevel;
use crate::dismissal::{DismissStage, Gate};
use crate::signal::HeartRateEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Snooze,
    Dismiss,
}

/// Every state change in a ringing episode produces an Event.
/// The UI renders from them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    EpisodeStarted {
        alarm_id: String,
        snooze_count: u32,
        scheduled_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    StageChanged {
        from: DismissStage,
        to: DismissStage,
        at: DateTime<Utc>,
    },
    /// A duplicate or late request was dropped without side effects.
    RequestIgnored {
        request: RequestKind,
        stage: DismissStage,
        at: DateTime<Utc>,
    },
    PuzzleSolved {
        level: DifficultyLevel,
        errors: u32,
        time_ms: u64,
        at: DateTime<Utc>,
    },
    HeartRateMeasured {
        estimate: Option<HeartRateEstimate>,
        at: DateTime<Utc>,
    },
    RecallAnswered {
        correct: bool,
        at: DateTime<Utc>,
    },
    /// A gate or collaborator call failed; the episode is still ringing.
    StepFailed {
        gate: Option<Gate>,
        message: String,
        at: DateTime<Utc>,
    },
    SnoozeScheduled {
        alarm_id: String,
        snooze_count: u32,
        duration_minutes: u32,
        at: DateTime<Utc>,
    },
    WakeRecorded {
        record_id: Uuid,
        total: u8,
        at: DateTime<Utc>,
    },
    AlarmRearmed {
        alarm_id: String,
        at: DateTime<Utc>,
    },
}
