//! SQLite-based alarm and wake history storage.
//!
//! Provides persistent storage for:
//! - Alarm configurations
//! - Recall flash cards
//! - Completed wake records, pruned to the retention window
//! - Key-value store for application state

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Days, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::data_dir;
use crate::alarm::{AlarmConfig, RecallItem, WakeRecord};
use crate::collaborators::WakeStorage;
use crate::error::{DatabaseError, Result};
use crate::scoring::WakeScore;
use crate::signal::HeartRateEstimate;

const DEFAULT_RETENTION_DAYS: u32 = 30;

const WAKE_RECORD_COLUMNS: &str = "id, alarm_id, completed_at, score_puzzle, score_snooze,
     score_consistency, score_recall, score_total, snooze_count, puzzle_time_ms,
     puzzle_errors, recall_correct, wake_delta_minutes, heart_rate_bpm, heart_rate_confidence";

/// SQLite database for alarms and wake history.
pub struct Database {
    conn: Mutex<Connection>,
    retention_days: u32,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn corrupt(table: &str, message: impl Into<String>) -> DatabaseError {
    DatabaseError::CorruptRow {
        table: table.into(),
        message: message.into(),
    }
}

impl Database {
    /// Open the database at `~/.config/wakecheck/wakecheck.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("wakecheck.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
            retention_days: DEFAULT_RETENTION_DAYS,
        };
        db.migrate()?;
        Ok(db)
    }

    /// Wake records older than this many days are pruned on insert.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS alarms (
                id      TEXT PRIMARY KEY,
                time    TEXT NOT NULL,
                config  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recall_items (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                prompt  TEXT NOT NULL,
                answer  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS wake_records (
                id                    TEXT PRIMARY KEY,
                alarm_id              TEXT NOT NULL,
                completed_at          TEXT NOT NULL,
                score_puzzle          INTEGER NOT NULL,
                score_snooze          INTEGER NOT NULL,
                score_consistency     INTEGER NOT NULL,
                score_recall          INTEGER NOT NULL,
                score_total           INTEGER NOT NULL,
                snooze_count          INTEGER NOT NULL,
                puzzle_time_ms        INTEGER NOT NULL,
                puzzle_errors         INTEGER NOT NULL,
                recall_correct        INTEGER,
                wake_delta_minutes    INTEGER NOT NULL,
                heart_rate_bpm        REAL,
                heart_rate_confidence REAL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_wake_records_completed_at ON wake_records(completed_at);
            CREATE INDEX IF NOT EXISTS idx_wake_records_alarm_id ON wake_records(alarm_id);",
        )?;
        Ok(())
    }

    // ── Alarms ──────────────────────────────────────────────────────────

    /// Insert or replace an alarm after validating it.
    ///
    /// # Errors
    /// Returns a validation error for malformed alarms, or a database error.
    pub fn upsert_alarm(&self, alarm: &AlarmConfig) -> Result<()> {
        alarm.validate()?;
        let json = serde_json::to_string(alarm)?;
        self.conn().execute(
            "INSERT INTO alarms (id, time, config) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET time = excluded.time, config = excluded.config",
            params![alarm.id, alarm.time.format("%H:%M").to_string(), json],
        )?;
        debug!(alarm_id = %alarm.id, "alarm saved");
        Ok(())
    }

    pub fn get_alarm(&self, id: &str) -> Result<Option<AlarmConfig>> {
        let json: Option<String> = self
            .conn()
            .query_row("SELECT config FROM alarms WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        match json {
            Some(j) => {
                let alarm = serde_json::from_str::<AlarmConfig>(&j)
                    .map_err(|e| corrupt("alarms", e.to_string()))?;
                Ok(Some(alarm))
            }
            None => Ok(None),
        }
    }

    /// All alarms ordered by time of day.
    pub fn list_alarms(&self) -> Result<Vec<AlarmConfig>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT config FROM alarms ORDER BY time, id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut alarms = Vec::new();
        for json in rows {
            let alarm = serde_json::from_str(&json?).map_err(|e| corrupt("alarms", e.to_string()))?;
            alarms.push(alarm);
        }
        Ok(alarms)
    }

    /// Returns `true` if an alarm was removed.
    pub fn remove_alarm(&self, id: &str) -> Result<bool> {
        let n = self
            .conn()
            .execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // ── Recall items ────────────────────────────────────────────────────

    pub fn add_recall_item(&self, prompt: &str, answer: &str) -> Result<RecallItem> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO recall_items (prompt, answer) VALUES (?1, ?2)",
            params![prompt, answer],
        )?;
        Ok(RecallItem {
            id: conn.last_insert_rowid(),
            prompt: prompt.to_string(),
            answer: answer.to_string(),
        })
    }

    pub fn list_recall_items(&self) -> Result<Vec<RecallItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, prompt, answer FROM recall_items ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(RecallItem {
                id: row.get(0)?,
                prompt: row.get(1)?,
                answer: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Wake records ────────────────────────────────────────────────────

    /// Append a wake record and prune records that fell out of the
    /// retention window relative to this record's completion time.
    ///
    /// Insert and prune commit together: on error nothing is stored.
    pub fn insert_wake_record(&self, record: &WakeRecord) -> Result<()> {
        let hr_bpm = record.heart_rate.map(|h| h.bpm);
        let hr_conf = record.heart_rate.map(|h| h.confidence);
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO wake_records ({WAKE_RECORD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                record.id.to_string(),
                record.alarm_id,
                timestamp(record.completed_at),
                record.score.puzzle,
                record.score.snooze,
                record.score.consistency,
                record.score.recall,
                record.score.total,
                record.snooze_count,
                i64::try_from(record.puzzle_time_ms).unwrap_or(i64::MAX),
                record.puzzle_errors,
                record.recall_correct,
                record.wake_delta_minutes,
                hr_bpm,
                hr_conf,
            ],
        )?;

        // a window reaching past the calendar start keeps everything
        let pruned = match record
            .completed_at
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
        {
            Some(cutoff) => tx.execute(
                "DELETE FROM wake_records WHERE completed_at < ?1",
                params![timestamp(cutoff)],
            )?,
            None => 0,
        };
        tx.commit()?;

        if pruned > 0 {
            info!(pruned, retention_days = self.retention_days, "pruned old wake records");
        }
        Ok(())
    }

    /// Delete wake records completed strictly before `cutoff`.
    pub fn prune_wake_records(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let n = self.conn().execute(
            "DELETE FROM wake_records WHERE completed_at < ?1",
            params![timestamp(cutoff)],
        )?;
        Ok(n)
    }

    /// Most recent records first, optionally for one alarm.
    pub fn list_wake_records(&self, alarm_id: Option<&str>, limit: usize) -> Result<Vec<WakeRecord>> {
        let conn = self.conn();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut out = Vec::new();
        match alarm_id {
            Some(id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {WAKE_RECORD_COLUMNS} FROM wake_records
                     WHERE alarm_id = ?1 ORDER BY completed_at DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![id, limit], raw_wake_record)?;
                for row in rows {
                    out.push(row?.decode()?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {WAKE_RECORD_COLUMNS} FROM wake_records
                     ORDER BY completed_at DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit], raw_wake_record)?;
                for row in rows {
                    out.push(row?.decode()?);
                }
            }
        }
        Ok(out)
    }

    // ── Key-value ───────────────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Columns as SQLite hands them back, before the text fields are parsed.
struct RawWakeRecord {
    id: String,
    alarm_id: String,
    completed_at: String,
    score: WakeScore,
    snooze_count: u32,
    puzzle_time_ms: i64,
    puzzle_errors: u32,
    recall_correct: Option<bool>,
    wake_delta_minutes: i64,
    heart_rate_bpm: Option<f64>,
    heart_rate_confidence: Option<f64>,
}

fn raw_wake_record(row: &Row<'_>) -> rusqlite::Result<RawWakeRecord> {
    Ok(RawWakeRecord {
        id: row.get(0)?,
        alarm_id: row.get(1)?,
        completed_at: row.get(2)?,
        score: WakeScore {
            puzzle: row.get(3)?,
            snooze: row.get(4)?,
            consistency: row.get(5)?,
            recall: row.get(6)?,
            total: row.get(7)?,
        },
        snooze_count: row.get(8)?,
        puzzle_time_ms: row.get(9)?,
        puzzle_errors: row.get(10)?,
        recall_correct: row.get(11)?,
        wake_delta_minutes: row.get(12)?,
        heart_rate_bpm: row.get(13)?,
        heart_rate_confidence: row.get(14)?,
    })
}

impl RawWakeRecord {
    fn decode(self) -> std::result::Result<WakeRecord, DatabaseError> {
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt("wake_records", e.to_string()))?;
        let completed_at = DateTime::parse_from_rfc3339(&self.completed_at)
            .map_err(|e| corrupt("wake_records", e.to_string()))?
            .with_timezone(&Utc);
        let heart_rate = match (self.heart_rate_bpm, self.heart_rate_confidence) {
            (Some(bpm), Some(confidence)) => Some(HeartRateEstimate { bpm, confidence }),
            _ => None,
        };
        Ok(WakeRecord {
            id,
            alarm_id: self.alarm_id,
            completed_at,
            score: self.score,
            snooze_count: self.snooze_count,
            puzzle_time_ms: u64::try_from(self.puzzle_time_ms).unwrap_or(0),
            puzzle_errors: self.puzzle_errors,
            recall_correct: self.recall_correct,
            wake_delta_minutes: self.wake_delta_minutes,
            heart_rate,
        })
    }
}

impl WakeStorage for Database {
    fn load_alarm(&self, id: &str) -> Result<Option<AlarmConfig>> {
        self.get_alarm(id)
    }

    fn load_recall_items(&self) -> Result<Vec<RecallItem>> {
        self.list_recall_items()
    }

    fn append_wake_record(&self, record: &WakeRecord) -> Result<()> {
        self.insert_wake_record(record)
    }
}
