mod orchestrator;
mod session;
mod stage;

pub use orchestrator::{Collaborators, DismissalOrchestrator, EpisodeOutcome, EpisodeTrigger};
pub use session::WakeSession;
pub use stage::{DismissStage, Gate};
