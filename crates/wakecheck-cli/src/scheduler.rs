//! Scheduler backed by the store's key-value table.
//!
//! The CLI cannot wake a device. It records what an OS scheduler would
//! have been asked to do, so `alarm next` and later runs can read it back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wakecheck_core::error::Result;
use wakecheck_core::{AlarmConfig, AlarmScheduler, CoreError, Database};

const SNOOZE_KEY: &str = "snooze";
const NEXT_TRIGGER_KEY: &str = "next_trigger";

/// A pending snooze reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnoozeReminder {
    pub due_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub sound: String,
    pub label: String,
}

pub struct KvScheduler {
    db: Arc<Database>,
}

fn key(kind: &str, alarm_id: &str) -> String {
    format!("{kind}:{alarm_id}")
}

/// Next local trigger of `alarm` strictly after `after`.
pub fn next_trigger(alarm: &AlarmConfig, after: DateTime<Local>) -> Option<DateTime<Local>> {
    let naive = alarm.next_trigger_after(after.naive_local())?;
    Local.from_local_datetime(&naive).earliest()
}

impl KvScheduler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn pending_snooze(&self, alarm_id: &str) -> Result<Option<SnoozeReminder>> {
        match self.db.kv_get(&key(SNOOZE_KEY, alarm_id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn armed_trigger(&self, alarm_id: &str) -> Result<Option<DateTime<Utc>>> {
        match self.db.kv_get(&key(NEXT_TRIGGER_KEY, alarm_id))? {
            Some(raw) => {
                let at = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| CoreError::collaborator("scheduler", e.to_string()))?;
                Ok(Some(at.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }
}

impl AlarmScheduler for KvScheduler {
    fn schedule_snooze_reminder(
        &self,
        alarm_id: &str,
        duration_minutes: u32,
        sound_ref: &str,
        label: &str,
    ) -> Result<()> {
        let reminder = SnoozeReminder {
            due_at: Utc::now() + Duration::minutes(i64::from(duration_minutes)),
            duration_minutes,
            sound: sound_ref.to_string(),
            label: label.to_string(),
        };
        self.db
            .kv_set(&key(SNOOZE_KEY, alarm_id), &serde_json::to_string(&reminder)?)?;
        debug!(alarm_id, due_at = %reminder.due_at, "snooze reminder recorded");
        Ok(())
    }

    fn cancel_active_notification(&self, alarm_id: &str) -> Result<()> {
        self.db.kv_remove(&key(SNOOZE_KEY, alarm_id))
    }

    fn rearm_alarm(&self, alarm: &AlarmConfig) -> Result<()> {
        let slot = key(NEXT_TRIGGER_KEY, &alarm.id);
        if !alarm.enabled {
            return self.db.kv_remove(&slot);
        }
        let next = next_trigger(alarm, Local::now()).ok_or_else(|| {
            CoreError::collaborator("scheduler", format!("alarm '{}' has no upcoming trigger", alarm.id))
        })?;
        self.db.kv_set(&slot, &next.with_timezone(&Utc).to_rfc3339())?;
        debug!(alarm_id = %alarm.id, %next, "alarm armed");
        Ok(())
    }
}
