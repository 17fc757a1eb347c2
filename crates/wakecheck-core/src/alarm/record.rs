use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::WakeScore;
use crate::signal::HeartRateEstimate;

/// One completed dismissal. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeRecord {
    pub id: Uuid,
    pub alarm_id: String,
    pub completed_at: DateTime<Utc>,
    pub score: WakeScore,
    pub snooze_count: u32,
    pub puzzle_time_ms: u64,
    pub puzzle_errors: u32,
    /// `None` when the recall gate was disabled or never reached.
    pub recall_correct: Option<bool>,
    /// Minutes between the scheduled trigger and completion; positive = late.
    pub wake_delta_minutes: i64,
    #[serde(default)]
    pub heart_rate: Option<HeartRateEstimate>,
}

/// A flash card shown by the recall gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallItem {
    pub id: i64,
    pub prompt: String,
    pub answer: String,
}
