use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleMode {
    /// Difficulty follows the snooze count from a fixed base.
    Auto,
    /// Difficulty starts from `manual_difficulty`.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_mode")]
    pub mode: PuzzleMode,
    /// Base level for manual mode, 1-4.
    #[serde(default = "default_manual_difficulty")]
    pub manual_difficulty: u8,
}

impl Default for PuzzleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: default_mode(),
            manual_difficulty: default_manual_difficulty(),
        }
    }
}

/// Which days an alarm fires on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "days", rename_all = "lowercase")]
pub enum RepeatRule {
    Daily,
    Weekdays(Vec<Weekday>),
}

impl RepeatRule {
    pub fn includes(&self, day: Weekday) -> bool {
        match self {
            RepeatRule::Daily => true,
            RepeatRule::Weekdays(days) => days.contains(&day),
        }
    }

    /// First trigger strictly after `after` at time-of-day `at`.
    ///
    /// Returns `None` only for an empty weekday set.
    pub fn next_occurrence(&self, at: NaiveTime, after: NaiveDateTime) -> Option<NaiveDateTime> {
        (0..=7).find_map(|offset| {
            let candidate = (after.date() + Duration::days(offset)).and_time(at);
            (candidate > after && self.includes(candidate.weekday())).then_some(candidate)
        })
    }
}

/// A user-configured alarm. Owned by storage; the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Scheduled time-of-day, local time.
    pub time: NaiveTime,
    #[serde(default = "default_repeat")]
    pub repeat: RepeatRule,
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    /// Opaque ringtone reference handed to the scheduler.
    #[serde(default = "default_sound")]
    pub sound: String,
    #[serde(default)]
    pub puzzle: PuzzleSettings,
    #[serde(default)]
    pub heart_rate_enabled: bool,
    #[serde(default)]
    pub recall_enabled: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}
fn default_mode() -> PuzzleMode {
    PuzzleMode::Auto
}
fn default_manual_difficulty() -> u8 {
    2
}
fn default_repeat() -> RepeatRule {
    RepeatRule::Daily
}
fn default_snooze_minutes() -> u32 {
    9
}
fn default_sound() -> String {
    "default".into()
}

impl AlarmConfig {
    /// Daily alarm with default gates (puzzle on, heart rate and recall off).
    pub fn new(id: impl Into<String>, time: NaiveTime) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            time,
            repeat: default_repeat(),
            snooze_minutes: default_snooze_minutes(),
            sound: default_sound(),
            puzzle: PuzzleSettings::default(),
            heart_rate_enabled: false,
            recall_enabled: false,
            enabled: true,
        }
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            "Alarm"
        } else {
            &self.label
        }
    }

    /// Next trigger strictly after `after` (local time).
    pub fn next_trigger_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        self.repeat.next_occurrence(self.time, after)
    }

    /// Boundary checks applied by storage before an alarm is accepted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: "must not be empty".into(),
            });
        }
        if !(1..=4).contains(&self.puzzle.manual_difficulty) {
            return Err(ValidationError::InvalidValue {
                field: "puzzle.manual_difficulty".into(),
                message: format!("must be 1-4, got {}", self.puzzle.manual_difficulty),
            });
        }
        if self.snooze_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "snooze_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        if let RepeatRule::Weekdays(days) = &self.repeat {
            if days.is_empty() {
                return Err(ValidationError::EmptyCollection("repeat weekdays".into()));
            }
        }
        Ok(())
    }
}
