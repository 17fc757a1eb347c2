//! Dismissal orchestrator.
//!
//! Owns the [`WakeSession`] of one ringing episode and walks it through
//! the gates configured on the alarm. It never implements a gate itself:
//! puzzles, heart-rate checks and recall are awaited through the
//! collaborator traits, and their outcomes are written into the session.
//!
//! ## Requests
//!
//! - [`request_snooze`](DismissalOrchestrator::request_snooze): puzzle at
//!   snooze difficulty, then a reminder is scheduled and the episode ends.
//! - [`request_dismiss`](DismissalOrchestrator::request_dismiss): puzzle at
//!   dismiss difficulty, optional heart-rate and recall gates, scoring, a
//!   persisted [`WakeRecord`], and a re-armed alarm.
//!
//! Only one request runs at a time. Requests arriving while another is in
//! flight, or after the episode has ended, return
//! [`EpisodeOutcome::Ignored`] and change nothing but the event log.
//!
//! The session mutex is never held across an `.await`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::session::WakeSession;
use super::stage::{DismissStage, Gate};
use crate::alarm::{AlarmConfig, WakeRecord};
use crate::collaborators::{
    AlarmScheduler, Clock, HeartRateSubsystem, PuzzleOutcome, PuzzleSubsystem, RecallSubsystem,
    WakeStorage,
};
use crate::difficulty::{dismiss_difficulty, snooze_difficulty, DifficultyLevel};
use crate::error::{CoreError, Result};
use crate::events::{Event, RequestKind};
use crate::scoring::{score, ScoreInputs};

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn WakeStorage>,
    pub scheduler: Arc<dyn AlarmScheduler>,
    pub puzzle: Arc<dyn PuzzleSubsystem>,
    pub heart_rate: Arc<dyn HeartRateSubsystem>,
    pub recall: Arc<dyn RecallSubsystem>,
    pub clock: Arc<dyn Clock>,
}

/// Why the alarm is ringing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EpisodeTrigger {
    /// The alarm's own schedule fired.
    Scheduled,
    /// A snooze reminder fired; escalation continues from `snooze_count`.
    SnoozeReminder { snooze_count: u32 },
}

impl EpisodeTrigger {
    fn snooze_count(self) -> u32 {
        match self {
            EpisodeTrigger::Scheduled => 0,
            EpisodeTrigger::SnoozeReminder { snooze_count } => snooze_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EpisodeOutcome {
    /// Dropped: another request was in flight or the episode is over.
    Ignored,
    Rescheduled { snooze_count: u32 },
    Rearmed { record: WakeRecord },
}

pub struct DismissalOrchestrator {
    alarm: AlarmConfig,
    collaborators: Collaborators,
    session: Mutex<WakeSession>,
    in_flight: AtomicBool,
}

/// Held by the single running request. Dropping it mid-gate (error or
/// cancelled future) puts the episode back to `Ringing`.
struct InFlight<'a> {
    orchestrator: &'a DismissalOrchestrator,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let orchestrator = self.orchestrator;
        {
            let mut session = orchestrator.lock_session();
            if session.stage.is_gate() {
                let now = orchestrator.collaborators.clock.now();
                if session.transition(DismissStage::Ringing, now).is_ok() {
                    debug!(alarm_id = %session.alarm_id, "unfinished gate released");
                }
            }
        }
        orchestrator.in_flight.store(false, Ordering::Release);
    }
}

impl DismissalOrchestrator {
    /// Start ringing `alarm` for the occurrence scheduled at `scheduled_at`.
    pub fn ring(
        alarm: AlarmConfig,
        scheduled_at: DateTime<Utc>,
        trigger: EpisodeTrigger,
        collaborators: Collaborators,
    ) -> Self {
        let now = collaborators.clock.now();
        let session = WakeSession::new(alarm.id.clone(), scheduled_at, trigger.snooze_count(), now);
        info!(alarm_id = %alarm.id, ?trigger, "alarm ringing");
        Self {
            alarm,
            collaborators,
            session: Mutex::new(session),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Load the alarm from storage and start ringing it.
    pub fn ring_stored(
        alarm_id: &str,
        scheduled_at: DateTime<Utc>,
        trigger: EpisodeTrigger,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let alarm = collaborators
            .storage
            .load_alarm(alarm_id)?
            .ok_or_else(|| CoreError::AlarmNotFound(alarm_id.to_string()))?;
        Ok(Self::ring(alarm, scheduled_at, trigger, collaborators))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn alarm(&self) -> &AlarmConfig {
        &self.alarm
    }

    pub fn stage(&self) -> DismissStage {
        self.lock_session().stage
    }

    pub fn snooze_count(&self) -> u32 {
        self.lock_session().snooze_count
    }

    /// Snapshot of the session.
    pub fn session(&self) -> WakeSession {
        self.lock_session().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock_session().events.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn request_snooze(&self) -> Result<EpisodeOutcome> {
        let Some(_guard) = self.try_begin() else {
            return Ok(self.ignore(RequestKind::Snooze));
        };
        let (stage, snooze_count) = {
            let session = self.lock_session();
            (session.stage, session.snooze_count)
        };
        if stage != DismissStage::Ringing {
            return Ok(self.ignore(RequestKind::Snooze));
        }

        if self.alarm.puzzle.enabled {
            let level = snooze_difficulty(snooze_count);
            self.run_puzzle(DismissStage::PuzzleForSnooze, level).await?;
        }

        let label = format!("Snooze: {}", self.alarm.display_label());
        if let Err(err) = self.collaborators.scheduler.schedule_snooze_reminder(
            &self.alarm.id,
            self.alarm.snooze_minutes,
            &self.alarm.sound,
            &label,
        ) {
            return Err(self.fail(None, err));
        }

        let snooze_count = snooze_count + 1;
        {
            let now = self.collaborators.clock.now();
            let mut session = self.lock_session();
            session.snooze_count = snooze_count;
            session.transition(DismissStage::Rescheduled, now)?;
            session.push_event(Event::SnoozeScheduled {
                alarm_id: self.alarm.id.clone(),
                snooze_count,
                duration_minutes: self.alarm.snooze_minutes,
                at: now,
            });
        }
        info!(
            alarm_id = %self.alarm.id,
            snooze_count,
            minutes = self.alarm.snooze_minutes,
            "snooze scheduled"
        );
        Ok(EpisodeOutcome::Rescheduled { snooze_count })
    }

    pub async fn request_dismiss(&self) -> Result<EpisodeOutcome> {
        let Some(_guard) = self.try_begin() else {
            return Ok(self.ignore(RequestKind::Dismiss));
        };
        let (stage, pending) = {
            let session = self.lock_session();
            (session.stage, session.pending_record.clone())
        };

        match (stage, pending) {
            (DismissStage::Ringing, _) => {
                let record = self.run_dismissal().await?;
                self.rearm(record)
            }
            // record already persisted by an earlier attempt
            (DismissStage::Scored, Some(record)) => self.rearm(record),
            _ => Ok(self.ignore(RequestKind::Dismiss)),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn run_dismissal(&self) -> Result<WakeRecord> {
        let snooze_count = self.lock_session().snooze_count;

        if self.alarm.puzzle.enabled {
            let level = dismiss_difficulty(&self.alarm, snooze_count);
            self.run_puzzle(DismissStage::PuzzleForDismiss, level).await?;
        }

        if self.alarm.heart_rate_enabled {
            self.enter(DismissStage::HeartRateCheck)?;
            let estimate = match self.collaborators.heart_rate.measure().await {
                Ok(estimate) => estimate,
                Err(err) => {
                    warn!(alarm_id = %self.alarm.id, error = %err, "heart-rate check failed, continuing without a reading");
                    None
                }
            };
            let now = self.collaborators.clock.now();
            let mut session = self.lock_session();
            session.heart_rate = estimate;
            session.push_event(Event::HeartRateMeasured { estimate, at: now });
        }

        if self.alarm.recall_enabled {
            let items = match self.collaborators.storage.load_recall_items() {
                Ok(items) => items,
                Err(err) => return Err(self.fail(None, err)),
            };
            if items.is_empty() {
                debug!(alarm_id = %self.alarm.id, "no recall items, skipping recall gate");
            } else {
                self.enter(DismissStage::RecallCheck)?;
                let outcome = self.collaborators.recall.present(&items).await;
                let outcome = outcome.map_err(|err| self.fail(Some(Gate::Recall), err))?;
                let now = self.collaborators.clock.now();
                let mut session = self.lock_session();
                session.recall_correct = Some(outcome.correct);
                session.push_event(Event::RecallAnswered {
                    correct: outcome.correct,
                    at: now,
                });
            }
        }

        self.score_and_persist()
    }

    async fn run_puzzle(&self, stage: DismissStage, level: DifficultyLevel) -> Result<PuzzleOutcome> {
        {
            let now = self.collaborators.clock.now();
            let mut session = self.lock_session();
            session.transition(stage, now)?;
            session.puzzle_started_at = Some(now);
        }
        debug!(alarm_id = %self.alarm.id, %level, ?stage, "presenting puzzle");

        let outcome = self.collaborators.puzzle.present(level).await;
        let outcome = outcome.map_err(|err| self.fail(Some(Gate::Puzzle), err))?;

        let now = self.collaborators.clock.now();
        let mut session = self.lock_session();
        session.puzzle_errors = session.puzzle_errors.saturating_add(outcome.errors);
        session.puzzle_time_ms = outcome.time_ms;
        session.push_event(Event::PuzzleSolved {
            level,
            errors: outcome.errors,
            time_ms: outcome.time_ms,
            at: now,
        });
        Ok(outcome)
    }

    fn score_and_persist(&self) -> Result<WakeRecord> {
        let now = self.collaborators.clock.now();
        let record = {
            let mut session = self.lock_session();
            session.transition(DismissStage::Scored, now)?;
            let inputs = ScoreInputs {
                puzzle_time_ms: session.puzzle_time_ms,
                puzzle_errors: session.puzzle_errors,
                snooze_count: session.snooze_count,
                wake_delta_minutes: session.wake_delta_minutes(now),
                recall_correct: session.recall_correct,
            };
            WakeRecord {
                id: Uuid::new_v4(),
                alarm_id: self.alarm.id.clone(),
                completed_at: now,
                score: score(&inputs),
                snooze_count: inputs.snooze_count,
                puzzle_time_ms: inputs.puzzle_time_ms,
                puzzle_errors: inputs.puzzle_errors,
                recall_correct: inputs.recall_correct,
                wake_delta_minutes: inputs.wake_delta_minutes,
                heart_rate: session.heart_rate,
            }
        };

        if let Err(err) = self.collaborators.storage.append_wake_record(&record) {
            return Err(self.fail(None, err));
        }

        let mut session = self.lock_session();
        session.pending_record = Some(record.clone());
        session.push_event(Event::WakeRecorded {
            record_id: record.id,
            total: record.score.total,
            at: now,
        });
        info!(
            alarm_id = %self.alarm.id,
            total = record.score.total,
            delta_min = record.wake_delta_minutes,
            "wake record written"
        );
        Ok(record)
    }

    /// Cancel the notification and arm the next occurrence. A failure here
    /// keeps the session at `Scored` so a retry skips straight back here.
    fn rearm(&self, record: WakeRecord) -> Result<EpisodeOutcome> {
        let scheduler = &self.collaborators.scheduler;
        let result = scheduler
            .cancel_active_notification(&self.alarm.id)
            .and_then(|()| scheduler.rearm_alarm(&self.alarm));
        if let Err(err) = result {
            warn!(alarm_id = %self.alarm.id, error = %err, "re-arming failed");
            let now = self.collaborators.clock.now();
            self.lock_session().push_event(Event::StepFailed {
                gate: None,
                message: err.to_string(),
                at: now,
            });
            return Err(err);
        }

        let now = self.collaborators.clock.now();
        let mut session = self.lock_session();
        session.transition(DismissStage::Rearmed, now)?;
        session.pending_record = None;
        session.push_event(Event::AlarmRearmed {
            alarm_id: self.alarm.id.clone(),
            at: now,
        });
        info!(alarm_id = %self.alarm.id, "alarm re-armed");
        Ok(EpisodeOutcome::Rearmed { record })
    }

    fn enter(&self, stage: DismissStage) -> Result<()> {
        let now = self.collaborators.clock.now();
        self.lock_session().transition(stage, now)
    }

    /// Log a failed step and fall back to `Ringing`.
    fn fail(&self, gate: Option<Gate>, err: CoreError) -> CoreError {
        let now = self.collaborators.clock.now();
        let mut session = self.lock_session();
        warn!(alarm_id = %self.alarm.id, stage = ?session.stage, error = %err, "dismissal step failed");
        if session.stage != DismissStage::Ringing {
            if let Err(refused) = session.transition(DismissStage::Ringing, now) {
                warn!(error = %refused, "could not fall back to ringing");
            }
        }
        session.push_event(Event::StepFailed {
            gate,
            message: err.to_string(),
            at: now,
        });
        err
    }

    fn ignore(&self, request: RequestKind) -> EpisodeOutcome {
        let now = self.collaborators.clock.now();
        let mut session = self.lock_session();
        debug!(alarm_id = %self.alarm.id, ?request, stage = ?session.stage, "request ignored");
        let stage = session.stage;
        session.push_event(Event::RequestIgnored { request, stage, at: now });
        EpisodeOutcome::Ignored
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { orchestrator: self })
    }

    fn lock_session(&self) -> MutexGuard<'_, WakeSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
