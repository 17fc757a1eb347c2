mod config;
mod record;

pub use config::{AlarmConfig, PuzzleMode, PuzzleSettings, RepeatRule};
pub use record::{RecallItem, WakeRecord};
