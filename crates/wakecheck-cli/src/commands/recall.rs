use clap::Subcommand;

use super::{open_store, print_json};

#[derive(Subcommand)]
pub enum RecallAction {
    /// Add a flash card
    Add {
        /// Question shown at dismissal
        prompt: String,
        /// Expected answer
        answer: String,
    },
    /// List all flash cards
    List,
}

pub fn run(action: RecallAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store()?;

    match action {
        RecallAction::Add { prompt, answer } => {
            if prompt.trim().is_empty() || answer.trim().is_empty() {
                return Err("prompt and answer must not be empty".into());
            }
            let item = db.add_recall_item(prompt.trim(), answer.trim())?;
            print_json(&item)?;
        }
        RecallAction::List => {
            print_json(&db.list_recall_items()?)?;
        }
    }
    Ok(())
}
