//! Seams to everything the core does not implement itself.
//!
//! Storage and scheduling are synchronous and quick. The gate subsystems
//! are async because each one waits on the user for as long as it takes.
//! Implementations must be `Send + Sync` so one orchestrator can be shared
//! between the UI callbacks that drive it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmConfig, RecallItem, WakeRecord};
use crate::difficulty::DifficultyLevel;
use crate::error::Result;
use crate::signal::{HeartRateEstimate, PpgSample};

/// What a solved puzzle reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleOutcome {
    /// Wrong answers before the puzzle was solved.
    pub errors: u32,
    pub time_ms: u64,
}

/// What the recall gate reports once the user is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallOutcome {
    pub correct: bool,
}

/// Persistent store for alarms, recall items and wake history.
pub trait WakeStorage: Send + Sync {
    fn load_alarm(&self, id: &str) -> Result<Option<AlarmConfig>>;

    fn load_recall_items(&self) -> Result<Vec<RecallItem>>;

    fn append_wake_record(&self, record: &WakeRecord) -> Result<()>;
}

/// OS-level alarm scheduling and notification control.
pub trait AlarmScheduler: Send + Sync {
    fn schedule_snooze_reminder(
        &self,
        alarm_id: &str,
        duration_minutes: u32,
        sound_ref: &str,
        label: &str,
    ) -> Result<()>;

    fn cancel_active_notification(&self, alarm_id: &str) -> Result<()>;

    /// Arm the OS trigger for the alarm's next occurrence.
    fn rearm_alarm(&self, alarm: &AlarmConfig) -> Result<()>;
}

/// Any puzzle that can be solved at a given difficulty.
#[async_trait]
pub trait PuzzleSubsystem: Send + Sync {
    async fn present(&self, level: DifficultyLevel) -> Result<PuzzleOutcome>;
}

/// Flash-card recall. Retries on wrong answers are the subsystem's concern.
#[async_trait]
pub trait RecallSubsystem: Send + Sync {
    async fn present(&self, items: &[RecallItem]) -> Result<RecallOutcome>;
}

/// Heart-rate gate. `Ok(None)` means no usable reading was obtained.
#[async_trait]
pub trait HeartRateSubsystem: Send + Sync {
    async fn measure(&self) -> Result<Option<HeartRateEstimate>>;
}

/// Camera brightness feed. `Ok(None)` ends the stream.
#[async_trait]
pub trait SampleSource: Send {
    async fn next_sample(&mut self) -> Result<Option<PpgSample>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
