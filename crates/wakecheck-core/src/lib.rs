//! # Wakecheck Core Library
//!
//! This library provides the core logic for wakecheck, an alarm that makes
//! the user prove they are awake before it lets go. Everything platform
//! specific (puzzles on screen, the camera, OS notifications) sits behind
//! traits, so the same core drives the CLI and any app shell.
//!
//! ## Architecture
//!
//! - **Signal**: camera-PPG heart-rate estimation from per-frame brightness
//! - **Difficulty**: snooze and dismiss puzzle difficulty escalation
//! - **Scoring**: the 0-100 wakefulness score for a completed dismissal
//! - **Dismissal**: the snooze/dismiss state machine that sequences the gates
//! - **Storage**: SQLite alarm and wake history storage, TOML configuration
//!
//! ## Key Components
//!
//! - [`SignalProcessor`]: Incremental heart-rate estimator
//! - [`DismissalOrchestrator`]: One ringing episode, from first ring to re-arm
//! - [`Database`]: Alarm, recall item and wake record persistence
//! - [`Config`]: Application configuration management

pub mod alarm;
pub mod collaborators;
pub mod difficulty;
pub mod dismissal;
pub mod error;
pub mod events;
pub mod scoring;
pub mod signal;
pub mod storage;

pub use alarm::{AlarmConfig, PuzzleMode, PuzzleSettings, RecallItem, RepeatRule, WakeRecord};
pub use collaborators::{
    AlarmScheduler, Clock, HeartRateSubsystem, PuzzleOutcome, PuzzleSubsystem, RecallOutcome,
    RecallSubsystem, SampleSource, SystemClock, WakeStorage,
};
pub use difficulty::{dismiss_difficulty, snooze_difficulty, DifficultyLevel};
pub use dismissal::{
    Collaborators, DismissStage, DismissalOrchestrator, EpisodeOutcome, EpisodeTrigger, Gate,
    WakeSession,
};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, RequestKind};
pub use scoring::{score, ScoreInputs, WakeScore};
pub use signal::{
    CameraHeartRateCheck, HeartRateEstimate, PpgReading, PpgSample, QualityTier, ReplaySource,
    SampleBuffer, SignalProcessor, ASSUMED_SAMPLE_RATE_HZ, MIN_SAMPLES,
};
pub use storage::{Config, Database};
