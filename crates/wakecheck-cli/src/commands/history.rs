use clap::Subcommand;

use super::{open_store, print_json};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Most recent wake records first
    List {
        /// Only records for this alarm
        #[arg(long)]
        alarm: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store()?;

    match action {
        HistoryAction::List { alarm, limit } => {
            let records = db.list_wake_records(alarm.as_deref(), limit)?;
            print_json(&records)?;
        }
    }
    Ok(())
}
