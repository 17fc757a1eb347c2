use std::sync::Arc;

use chrono::{Local, NaiveTime, Weekday};
use clap::Subcommand;
use serde_json::json;
use wakecheck_core::{AlarmConfig, Config, RepeatRule};

use super::difficulty::ModeArg;
use super::{open_store, print_json};
use crate::scheduler::{next_trigger, KvScheduler};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Create or replace an alarm
    Add {
        /// Alarm ID
        id: String,
        /// Time of day, HH:MM
        time: String,
        #[arg(long, default_value = "")]
        label: String,
        /// Snooze length in minutes (defaults to snooze.default_duration_min)
        #[arg(long)]
        snooze: Option<u32>,
        /// Comma-separated weekdays, e.g. "mon,tue,fri" (default: every day)
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
        #[arg(long, default_value = "default")]
        sound: String,
        /// Dismiss without a puzzle
        #[arg(long)]
        no_puzzle: bool,
        #[arg(long, value_enum, default_value = "auto")]
        puzzle_mode: ModeArg,
        /// Base puzzle level in manual mode (1-4)
        #[arg(long, default_value = "2")]
        puzzle_level: u8,
        /// Require a heart-rate reading before dismissal
        #[arg(long)]
        heart_rate: bool,
        /// Ask a recall card before dismissal
        #[arg(long)]
        recall: bool,
        /// Store the alarm switched off
        #[arg(long)]
        disabled: bool,
    },
    /// List all alarms
    List,
    /// Remove an alarm
    Remove {
        /// Alarm ID
        id: String,
    },
    /// Show when an alarm fires next and any pending snooze reminder
    Next {
        /// Alarm ID
        id: String,
    },
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|e| format!("invalid time '{raw}': {e}"))
}

fn parse_days(raw: &[String]) -> Result<RepeatRule, String> {
    if raw.is_empty() {
        return Ok(RepeatRule::Daily);
    }
    let mut days = Vec::with_capacity(raw.len());
    for day in raw {
        let day: Weekday = day
            .trim()
            .parse()
            .map_err(|_| format!("invalid weekday '{day}'"))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(RepeatRule::Weekdays(days))
}

pub fn run(action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store()?;

    match action {
        AlarmAction::Add {
            id,
            time,
            label,
            snooze,
            days,
            sound,
            no_puzzle,
            puzzle_mode,
            puzzle_level,
            heart_rate,
            recall,
            disabled,
        } => {
            let mut alarm = AlarmConfig::new(id, parse_time(&time)?);
            alarm.label = label;
            alarm.snooze_minutes =
                snooze.unwrap_or_else(|| Config::load_or_default().snooze.default_duration_min);
            alarm.repeat = parse_days(&days)?;
            alarm.sound = sound;
            alarm.puzzle.enabled = !no_puzzle;
            alarm.puzzle.mode = puzzle_mode.into();
            alarm.puzzle.manual_difficulty = puzzle_level;
            alarm.heart_rate_enabled = heart_rate;
            alarm.recall_enabled = recall;
            alarm.enabled = !disabled;
            db.upsert_alarm(&alarm)?;
            print_json(&alarm)?;
        }
        AlarmAction::List => {
            print_json(&db.list_alarms()?)?;
        }
        AlarmAction::Remove { id } => {
            if !db.remove_alarm(&id)? {
                return Err(format!("alarm not found: {id}").into());
            }
            println!("removed {id}");
        }
        AlarmAction::Next { id } => {
            let alarm = db
                .get_alarm(&id)?
                .ok_or_else(|| format!("alarm not found: {id}"))?;
            let next = if alarm.enabled {
                next_trigger(&alarm, Local::now())
            } else {
                None
            };
            let scheduler = KvScheduler::new(Arc::new(db));
            print_json(&json!({
                "id": alarm.id,
                "label": alarm.display_label(),
                "enabled": alarm.enabled,
                "next": next.map(|at| at.to_rfc3339()),
                "armed": scheduler.armed_trigger(&alarm.id)?,
                "pending_snooze": scheduler.pending_snooze(&alarm.id)?,
            }))?;
        }
    }
    Ok(())
}
