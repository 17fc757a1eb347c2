use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wakecheck_core::Config;

mod commands;
mod scheduler;

#[derive(Parser)]
#[command(name = "wakecheck", version, about = "Wakecheck CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one wake encounter
    Score(commands::score::ScoreArgs),
    /// Puzzle difficulty for a snooze or dismiss gate
    Difficulty {
        #[command(subcommand)]
        action: commands::difficulty::DifficultyAction,
    },
    /// Heart-rate analysis of PPG captures
    Hr {
        #[command(subcommand)]
        action: commands::hr::HrAction,
    },
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Recall flash cards
    Recall {
        #[command(subcommand)]
        action: commands::recall::RecallAction,
    },
    /// Wake history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Run a ringing episode with scripted answers
    Simulate {
        #[command(subcommand)]
        action: commands::simulate::SimulateAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so JSON on stdout stays machine-readable.
fn init_logging() {
    let filter = EnvFilter::try_from_env("WAKECHECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(Config::load_or_default().logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Score(args) => commands::score::run(args),
        Commands::Difficulty { action } => commands::difficulty::run(action),
        Commands::Hr { action } => commands::hr::run(action),
        Commands::Alarm { action } => commands::alarm::run(action),
        Commands::Recall { action } => commands::recall::run(action),
        Commands::History { action } => commands::history::run(action),
        Commands::Simulate { action } => commands::simulate::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
