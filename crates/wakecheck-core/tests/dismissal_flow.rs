//! Integration tests for the dismissal state machine.
//!
//! Drives a full ringing episode through fake collaborators and checks
//! what reached storage and the scheduler, including the concurrent and
//! failure paths.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use wakecheck_core::{
    AlarmConfig, AlarmScheduler, Clock, Collaborators, CoreError, DifficultyLevel, DismissStage,
    DismissalOrchestrator, EpisodeOutcome, EpisodeTrigger, Event, Gate, HeartRateEstimate,
    HeartRateSubsystem, PuzzleOutcome, PuzzleSubsystem, RecallItem, RecallOutcome,
    RecallSubsystem, WakeRecord, WakeStorage,
};

// ── Fakes ───────────────────────────────────────────────────────────────

struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
struct MemoryStorage {
    alarms: HashMap<String, AlarmConfig>,
    recall_items: Vec<RecallItem>,
    records: Mutex<Vec<WakeRecord>>,
    append_failures: AtomicU32,
}

impl MemoryStorage {
    fn records(&self) -> Vec<WakeRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl WakeStorage for MemoryStorage {
    fn load_alarm(&self, id: &str) -> wakecheck_core::error::Result<Option<AlarmConfig>> {
        Ok(self.alarms.get(id).cloned())
    }

    fn load_recall_items(&self) -> wakecheck_core::error::Result<Vec<RecallItem>> {
        Ok(self.recall_items.clone())
    }

    fn append_wake_record(&self, record: &WakeRecord) -> wakecheck_core::error::Result<()> {
        if take_failure(&self.append_failures) {
            return Err(CoreError::collaborator("storage", "disk full"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    snoozes: Mutex<Vec<(String, u32, String, String)>>,
    cancelled: Mutex<Vec<String>>,
    rearmed: Mutex<Vec<String>>,
    snooze_failures: AtomicU32,
    rearm_failures: AtomicU32,
}

impl AlarmScheduler for RecordingScheduler {
    fn schedule_snooze_reminder(
        &self,
        alarm_id: &str,
        duration_minutes: u32,
        sound_ref: &str,
        label: &str,
    ) -> wakecheck_core::error::Result<()> {
        if take_failure(&self.snooze_failures) {
            return Err(CoreError::collaborator("scheduler", "notification permission denied"));
        }
        self.snoozes.lock().unwrap().push((
            alarm_id.into(),
            duration_minutes,
            sound_ref.into(),
            label.into(),
        ));
        Ok(())
    }

    fn cancel_active_notification(&self, alarm_id: &str) -> wakecheck_core::error::Result<()> {
        self.cancelled.lock().unwrap().push(alarm_id.into());
        Ok(())
    }

    fn rearm_alarm(&self, alarm: &AlarmConfig) -> wakecheck_core::error::Result<()> {
        if take_failure(&self.rearm_failures) {
            return Err(CoreError::collaborator("scheduler", "exact alarm not allowed"));
        }
        self.rearmed.lock().unwrap().push(alarm.id.clone());
        Ok(())
    }
}

enum PuzzleStep {
    Solve(PuzzleOutcome),
    Fail,
    Hang,
}

/// Plays back scripted outcomes, then solves instantly with no errors.
#[derive(Default)]
struct ScriptedPuzzle {
    script: Mutex<VecDeque<PuzzleStep>>,
    levels: Mutex<Vec<DifficultyLevel>>,
}

impl ScriptedPuzzle {
    fn with(steps: impl IntoIterator<Item = PuzzleStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            levels: Mutex::default(),
        }
    }

    fn levels(&self) -> Vec<u8> {
        self.levels.lock().unwrap().iter().map(|l| l.as_u8()).collect()
    }
}

#[async_trait]
impl PuzzleSubsystem for ScriptedPuzzle {
    async fn present(&self, level: DifficultyLevel) -> wakecheck_core::error::Result<PuzzleOutcome> {
        self.levels.lock().unwrap().push(level);
        let step = self.script.lock().unwrap().pop_front();
        // give concurrent requests a chance to run
        tokio::task::yield_now().await;
        match step {
            Some(PuzzleStep::Solve(outcome)) => Ok(outcome),
            Some(PuzzleStep::Fail) => Err(CoreError::collaborator("puzzle", "renderer crashed")),
            Some(PuzzleStep::Hang) => std::future::pending().await,
            None => Ok(PuzzleOutcome {
                errors: 0,
                time_ms: 8_000,
            }),
        }
    }
}

#[derive(Default)]
struct FixedRecall {
    correct: bool,
    calls: AtomicU32,
}

#[async_trait]
impl RecallSubsystem for FixedRecall {
    async fn present(&self, items: &[RecallItem]) -> wakecheck_core::error::Result<RecallOutcome> {
        assert!(!items.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RecallOutcome {
            correct: self.correct,
        })
    }
}

enum HeartRateBehaviour {
    Reading(HeartRateEstimate),
    NoFinger,
    CameraError,
}

struct FakeHeartRate {
    behaviour: HeartRateBehaviour,
    calls: AtomicU32,
}

impl FakeHeartRate {
    fn new(behaviour: HeartRateBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl HeartRateSubsystem for FakeHeartRate {
    async fn measure(&self) -> wakecheck_core::error::Result<Option<HeartRateEstimate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            HeartRateBehaviour::Reading(estimate) => Ok(Some(estimate)),
            HeartRateBehaviour::NoFinger => Ok(None),
            HeartRateBehaviour::CameraError => Err(CoreError::collaborator("camera", "busy")),
        }
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    storage: Arc<MemoryStorage>,
    scheduler: Arc<RecordingScheduler>,
    puzzle: Arc<ScriptedPuzzle>,
    heart_rate: Arc<FakeHeartRate>,
    recall: Arc<FixedRecall>,
    clock: Arc<FixedClock>,
}

impl Harness {
    fn new() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::default()),
            scheduler: Arc::new(RecordingScheduler::default()),
            puzzle: Arc::new(ScriptedPuzzle::default()),
            heart_rate: Arc::new(FakeHeartRate::new(HeartRateBehaviour::NoFinger)),
            recall: Arc::new(FixedRecall::default()),
            clock: Arc::new(FixedClock::at(scheduled())),
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            storage: self.storage.clone(),
            scheduler: self.scheduler.clone(),
            puzzle: self.puzzle.clone(),
            heart_rate: self.heart_rate.clone(),
            recall: self.recall.clone(),
            clock: self.clock.clone(),
        }
    }

    fn ring(&self, alarm: AlarmConfig) -> DismissalOrchestrator {
        DismissalOrchestrator::ring(alarm, scheduled(), EpisodeTrigger::Scheduled, self.collaborators())
    }
}

fn scheduled() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap()
}

fn alarm() -> AlarmConfig {
    let mut alarm = AlarmConfig::new("morning", NaiveTime::from_hms_opt(7, 0, 0).unwrap());
    alarm.label = "Work".into();
    alarm
}

fn recall_items() -> Vec<RecallItem> {
    vec![RecallItem {
        id: 1,
        prompt: "Capital of Japan?".into(),
        answer: "Tokyo".into(),
    }]
}

fn rearmed_record(outcome: EpisodeOutcome) -> WakeRecord {
    match outcome {
        EpisodeOutcome::Rearmed { record } => record,
        other => panic!("expected Rearmed, got {other:?}"),
    }
}

// ── Dismiss ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn dismiss_with_only_puzzle_enabled_visits_only_the_puzzle_gate() {
    let h = Harness::new();
    let orch = h.ring(alarm());

    let record = rearmed_record(orch.request_dismiss().await.unwrap());

    assert_eq!(orch.stage(), DismissStage::Rearmed);
    assert_eq!(orch.session().gates_visited, vec![Gate::Puzzle]);
    assert_eq!(h.puzzle.levels(), vec![2]);
    assert_eq!(h.heart_rate.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.recall.calls.load(Ordering::SeqCst), 0);

    assert_eq!(h.storage.records(), vec![record.clone()]);
    assert_eq!(record.score.total, 100);
    assert_eq!(record.recall_correct, None);
    assert_eq!(record.heart_rate, None);
    assert_eq!(*h.scheduler.cancelled.lock().unwrap(), vec!["morning".to_string()]);
    assert_eq!(*h.scheduler.rearmed.lock().unwrap(), vec!["morning".to_string()]);
    assert!(!orch.is_busy());
}

#[tokio::test]
async fn rapid_double_dismiss_writes_one_record() {
    let h = Harness::new();
    let orch = h.ring(alarm());

    let (first, second) = tokio::join!(orch.request_dismiss(), orch.request_dismiss());

    assert!(matches!(first.unwrap(), EpisodeOutcome::Rearmed { .. }));
    assert_eq!(second.unwrap(), EpisodeOutcome::Ignored);
    assert_eq!(h.storage.records().len(), 1);
    assert_eq!(h.scheduler.rearmed.lock().unwrap().len(), 1);
    assert!(orch
        .events()
        .iter()
        .any(|e| matches!(e, Event::RequestIgnored { .. })));
}

#[tokio::test]
async fn full_dismissal_runs_every_gate_in_order() {
    let mut h = Harness::new();
    h.heart_rate = Arc::new(FakeHeartRate::new(HeartRateBehaviour::Reading(HeartRateEstimate {
        bpm: 64.0,
        confidence: 91.0,
    })));
    h.recall = Arc::new(FixedRecall {
        correct: true,
        calls: AtomicU32::new(0),
    });
    h.storage = Arc::new(MemoryStorage {
        recall_items: recall_items(),
        ..MemoryStorage::default()
    });
    let mut cfg = alarm();
    cfg.heart_rate_enabled = true;
    cfg.recall_enabled = true;
    let orch = h.ring(cfg);

    h.clock.advance(Duration::minutes(3));
    let record = rearmed_record(orch.request_dismiss().await.unwrap());

    assert_eq!(
        orch.session().gates_visited,
        vec![Gate::Puzzle, Gate::HeartRate, Gate::Recall]
    );
    assert_eq!(record.heart_rate.map(|hr| hr.bpm), Some(64.0));
    assert_eq!(record.recall_correct, Some(true));
    assert_eq!(record.wake_delta_minutes, 3);
    assert_eq!(record.score.recall, 10);
    // 50 + 30 + 20 + 10, capped
    assert_eq!(record.score.total, 100);

    let stages: Vec<DismissStage> = orch
        .events()
        .iter()
        .filter_map(|e| match e {
            Event::StageChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            DismissStage::PuzzleForDismiss,
            DismissStage::HeartRateCheck,
            DismissStage::RecallCheck,
            DismissStage::Scored,
            DismissStage::Rearmed,
        ]
    );
}

#[tokio::test]
async fn recall_gate_skipped_without_items() {
    let mut h = Harness::new();
    h.recall = Arc::new(FixedRecall {
        correct: true,
        calls: AtomicU32::new(0),
    });
    let mut cfg = alarm();
    cfg.recall_enabled = true;
    let orch = h.ring(cfg);

    let record = rearmed_record(orch.request_dismiss().await.unwrap());

    assert_eq!(h.recall.calls.load(Ordering::SeqCst), 0);
    assert_eq!(record.recall_correct, None);
    assert_eq!(orch.session().gates_visited, vec![Gate::Puzzle]);
}

#[tokio::test]
async fn heart_rate_failure_does_not_block_dismissal() {
    let mut h = Harness::new();
    h.heart_rate = Arc::new(FakeHeartRate::new(HeartRateBehaviour::CameraError));
    let mut cfg = alarm();
    cfg.heart_rate_enabled = true;
    let orch = h.ring(cfg);

    let record = rearmed_record(orch.request_dismiss().await.unwrap());

    assert_eq!(record.heart_rate, None);
    assert_eq!(h.heart_rate.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.storage.records().len(), 1);
    assert!(orch
        .events()
        .iter()
        .any(|e| matches!(e, Event::HeartRateMeasured { estimate: None, .. })));
}

#[tokio::test]
async fn dismiss_without_puzzle_goes_straight_to_scoring() {
    let h = Harness::new();
    let mut cfg = alarm();
    cfg.puzzle.enabled = false;
    let orch = h.ring(cfg);

    let record = rearmed_record(orch.request_dismiss().await.unwrap());

    assert!(h.puzzle.levels().is_empty());
    assert!(orch.session().gates_visited.is_empty());
    assert_eq!(record.puzzle_time_ms, 0);
    assert_eq!(record.score.puzzle, 50);
}

#[tokio::test]
async fn puzzle_errors_accumulate_and_lower_the_score() {
    let h = Harness::new();
    let puzzle = Arc::new(ScriptedPuzzle::with([PuzzleStep::Solve(PuzzleOutcome {
        errors: 2,
        time_ms: 45_000,
    })]));
    let orch = DismissalOrchestrator::ring(
        alarm(),
        scheduled(),
        EpisodeTrigger::Scheduled,
        Collaborators {
            puzzle: puzzle.clone(),
            ..h.collaborators()
        },
    );

    h.clock.advance(Duration::minutes(25));
    let record = rearmed_record(orch.request_dismiss().await.unwrap());

    // 50 - 10 (slow) - 20 (errors)
    assert_eq!(record.score.puzzle, 20);
    assert_eq!(record.score.consistency, 0);
    assert_eq!(record.score.total, 50);
    assert_eq!(record.puzzle_errors, 2);
}

// ── Snooze ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn snooze_schedules_reminder_and_writes_no_record() {
    let h = Harness::new();
    let orch = h.ring(alarm());

    let outcome = orch.request_snooze().await.unwrap();

    assert_eq!(outcome, EpisodeOutcome::Rescheduled { snooze_count: 1 });
    assert_eq!(orch.stage(), DismissStage::Rescheduled);
    assert_eq!(orch.snooze_count(), 1);
    assert_eq!(h.puzzle.levels(), vec![1]);
    assert!(h.storage.records().is_empty());
    assert_eq!(
        *h.scheduler.snoozes.lock().unwrap(),
        vec![(
            "morning".to_string(),
            9,
            "default".to_string(),
            "Snooze: Work".to_string()
        )]
    );
}

#[tokio::test]
async fn requests_after_episode_end_are_ignored() {
    let h = Harness::new();
    let orch = h.ring(alarm());
    orch.request_snooze().await.unwrap();

    assert_eq!(orch.request_dismiss().await.unwrap(), EpisodeOutcome::Ignored);
    assert_eq!(orch.request_snooze().await.unwrap(), EpisodeOutcome::Ignored);
    assert_eq!(orch.stage(), DismissStage::Rescheduled);
    assert_eq!(h.scheduler.snoozes.lock().unwrap().len(), 1);
    assert!(h.storage.records().is_empty());
}

#[tokio::test]
async fn snooze_reminder_episode_escalates_difficulty() {
    let h = Harness::new();
    let orch = DismissalOrchestrator::ring(
        alarm(),
        scheduled(),
        EpisodeTrigger::SnoozeReminder { snooze_count: 3 },
        h.collaborators(),
    );

    assert_eq!(
        orch.request_snooze().await.unwrap(),
        EpisodeOutcome::Rescheduled { snooze_count: 4 }
    );

    let next = DismissalOrchestrator::ring(
        alarm(),
        scheduled(),
        EpisodeTrigger::SnoozeReminder { snooze_count: 4 },
        h.collaborators(),
    );
    h.clock.advance(Duration::minutes(36));
    let record = rearmed_record(next.request_dismiss().await.unwrap());

    // snooze at count 3 -> level 3; dismiss at count 4 -> 2 + 2
    assert_eq!(h.puzzle.levels(), vec![3, 4]);
    assert_eq!(record.snooze_count, 4);
    assert_eq!(record.score.snooze, 0);
}

#[tokio::test]
async fn snooze_scheduler_failure_returns_to_ringing() {
    let h = Harness::new();
    h.scheduler.snooze_failures.store(1, Ordering::SeqCst);
    let orch = h.ring(alarm());

    assert!(orch.request_snooze().await.is_err());
    assert_eq!(orch.stage(), DismissStage::Ringing);
    assert_eq!(orch.snooze_count(), 0);

    let outcome = orch.request_snooze().await.unwrap();
    assert_eq!(outcome, EpisodeOutcome::Rescheduled { snooze_count: 1 });
}

// ── Failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn puzzle_failure_returns_to_ringing_and_retry_succeeds() {
    let h = Harness::new();
    let puzzle = Arc::new(ScriptedPuzzle::with([PuzzleStep::Fail]));
    let orch = DismissalOrchestrator::ring(
        alarm(),
        scheduled(),
        EpisodeTrigger::Scheduled,
        Collaborators {
            puzzle: puzzle.clone(),
            ..h.collaborators()
        },
    );

    let err = orch.request_dismiss().await.unwrap_err();
    assert!(matches!(err, CoreError::Collaborator { .. }));
    assert_eq!(orch.stage(), DismissStage::Ringing);
    assert!(orch.events().iter().any(|e| matches!(
        e,
        Event::StepFailed {
            gate: Some(Gate::Puzzle),
            ..
        }
    )));

    rearmed_record(orch.request_dismiss().await.unwrap());
    assert_eq!(h.storage.records().len(), 1);
}

#[tokio::test]
async fn storage_failure_leaves_no_record_and_allows_retry() {
    let h = Harness::new();
    h.storage.append_failures.store(1, Ordering::SeqCst);
    let orch = h.ring(alarm());

    assert!(orch.request_dismiss().await.is_err());
    assert_eq!(orch.stage(), DismissStage::Ringing);
    assert!(h.storage.records().is_empty());
    assert!(h.scheduler.rearmed.lock().unwrap().is_empty());

    rearmed_record(orch.request_dismiss().await.unwrap());
    assert_eq!(h.storage.records().len(), 1);
}

#[tokio::test]
async fn rearm_failure_keeps_record_and_retry_only_rearms() {
    let h = Harness::new();
    h.scheduler.rearm_failures.store(1, Ordering::SeqCst);
    let orch = h.ring(alarm());

    assert!(orch.request_dismiss().await.is_err());
    assert_eq!(orch.stage(), DismissStage::Scored);
    assert_eq!(h.storage.records().len(), 1);

    let record = rearmed_record(orch.request_dismiss().await.unwrap());
    assert_eq!(h.storage.records(), vec![record]);
    assert_eq!(h.puzzle.levels().len(), 1);
    assert_eq!(orch.stage(), DismissStage::Rearmed);
}

#[tokio::test]
async fn cancelled_request_releases_the_gate() {
    let h = Harness::new();
    let puzzle = Arc::new(ScriptedPuzzle::with([PuzzleStep::Hang]));
    let orch = DismissalOrchestrator::ring(
        alarm(),
        scheduled(),
        EpisodeTrigger::Scheduled,
        Collaborators {
            puzzle: puzzle.clone(),
            ..h.collaborators()
        },
    );

    let timed_out =
        tokio::time::timeout(std::time::Duration::from_millis(20), orch.request_dismiss()).await;
    assert!(timed_out.is_err());
    assert_eq!(orch.stage(), DismissStage::Ringing);
    assert!(!orch.is_busy());

    rearmed_record(orch.request_dismiss().await.unwrap());
}

// ── Stored alarms ───────────────────────────────────────────────────────

#[tokio::test]
async fn ring_stored_loads_alarm_or_reports_missing() {
    let mut h = Harness::new();
    let mut alarms = HashMap::new();
    alarms.insert("morning".to_string(), alarm());
    h.storage = Arc::new(MemoryStorage {
        alarms,
        ..MemoryStorage::default()
    });

    let orch = DismissalOrchestrator::ring_stored(
        "morning",
        scheduled(),
        EpisodeTrigger::Scheduled,
        h.collaborators(),
    )
    .unwrap();
    assert_eq!(orch.alarm().label, "Work");

    let missing = DismissalOrchestrator::ring_stored(
        "evening",
        scheduled(),
        EpisodeTrigger::Scheduled,
        h.collaborators(),
    );
    assert!(matches!(missing, Err(CoreError::AlarmNotFound(id)) if id == "evening"));
}
