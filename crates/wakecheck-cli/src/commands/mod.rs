pub mod alarm;
pub mod config;
pub mod difficulty;
pub mod history;
pub mod hr;
pub mod recall;
pub mod score;
pub mod simulate;

use wakecheck_core::{Config, Database};

/// Open the store in the data dir with the configured history retention.
pub fn open_store() -> Result<Database, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(Database::open()?.with_retention_days(config.history.retention_days))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
