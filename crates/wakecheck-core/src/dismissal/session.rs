use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::stage::{DismissStage, Gate};
use crate::alarm::WakeRecord;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::signal::HeartRateEstimate;

/// State of one ringing episode. Lives only in memory; a restarted
/// process starts a new episode from the stored alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeSession {
    pub alarm_id: String,
    /// The occurrence that fired, used for the wake-time delta.
    pub scheduled_at: DateTime<Utc>,
    pub snooze_count: u32,
    pub stage: DismissStage,
    pub puzzle_started_at: Option<DateTime<Utc>>,
    pub puzzle_time_ms: u64,
    /// Wrong answers across every puzzle attempt in this episode.
    pub puzzle_errors: u32,
    pub recall_correct: Option<bool>,
    pub heart_rate: Option<HeartRateEstimate>,
    pub gates_visited: Vec<Gate>,
    /// Set once the record is persisted and the alarm still needs re-arming.
    pub pending_record: Option<WakeRecord>,
    pub events: Vec<Event>,
}

impl WakeSession {
    pub fn new(
        alarm_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        snooze_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let alarm_id = alarm_id.into();
        Self {
            events: vec![Event::EpisodeStarted {
                alarm_id: alarm_id.clone(),
                snooze_count,
                scheduled_at,
                at: now,
            }],
            alarm_id,
            scheduled_at,
            snooze_count,
            stage: DismissStage::Ringing,
            puzzle_started_at: None,
            puzzle_time_ms: 0,
            puzzle_errors: 0,
            recall_correct: None,
            heart_rate: None,
            gates_visited: Vec::new(),
            pending_record: None,
        }
    }

    /// Move to `to` if the stage table allows it.
    pub fn transition(&mut self, to: DismissStage, at: DateTime<Utc>) -> Result<()> {
        let from = self.stage;
        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidTransition { from, to });
        }
        self.stage = to;
        if let Some(gate) = to.gate() {
            self.gates_visited.push(gate);
        }
        debug!(alarm_id = %self.alarm_id, ?from, ?to, "stage changed");
        self.events.push(Event::StageChanged { from, to, at });
        Ok(())
    }

    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Signed minutes between the scheduled trigger and `now`, rounded.
    pub fn wake_delta_minutes(&self, now: DateTime<Utc>) -> i64 {
        let ms = (now - self.scheduled_at).num_milliseconds();
        (ms as f64 / 60_000.0).round() as i64
    }
}
