//! Stages of a ringing episode.
//!
//! ```text
//!            +--> PuzzleForSnooze --> Rescheduled
//! Ringing ---+
//!            +--> PuzzleForDismiss --> [HeartRateCheck] --> [RecallCheck] --> Scored --> Rearmed
//! ```
//!
//! Bracketed stages are optional and skipped when disabled. Any unfinished
//! gate (and `Scored`, before its record is persisted) may fall back to
//! `Ringing`. `Rescheduled` and `Rearmed` are terminal.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissStage {
    Ringing,
    PuzzleForSnooze,
    Rescheduled,
    PuzzleForDismiss,
    HeartRateCheck,
    RecallCheck,
    Scored,
    Rearmed,
}

/// A verification step the user has to get through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Puzzle,
    HeartRate,
    Recall,
}

impl DismissStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, DismissStage::Rescheduled | DismissStage::Rearmed)
    }

    /// Stages that wait on a subsystem.
    pub fn is_gate(self) -> bool {
        self.gate().is_some()
    }

    pub fn gate(self) -> Option<Gate> {
        match self {
            DismissStage::PuzzleForSnooze | DismissStage::PuzzleForDismiss => Some(Gate::Puzzle),
            DismissStage::HeartRateCheck => Some(Gate::HeartRate),
            DismissStage::RecallCheck => Some(Gate::Recall),
            _ => None,
        }
    }

    /// Position along the dismiss branch; later stages never lead back to
    /// earlier ones except through `Ringing`.
    fn dismiss_rank(self) -> Option<u8> {
        match self {
            DismissStage::PuzzleForDismiss => Some(1),
            DismissStage::HeartRateCheck => Some(2),
            DismissStage::RecallCheck => Some(3),
            DismissStage::Scored => Some(4),
            DismissStage::Rearmed => Some(5),
            _ => None,
        }
    }

    pub fn can_transition_to(self, to: DismissStage) -> bool {
        use DismissStage::*;

        match (self, to) {
            (Rescheduled, _) | (Rearmed, _) => false,

            // snooze branch; Rescheduled directly when the puzzle is off
            (Ringing, PuzzleForSnooze) | (Ringing, Rescheduled) => true,
            (PuzzleForSnooze, Rescheduled) | (PuzzleForSnooze, Ringing) => true,

            // dismiss branch moves strictly forward, skipping disabled stages
            (Ringing, next) if next != Rearmed => next.dismiss_rank().is_some(),
            (Scored, Rearmed) | (Scored, Ringing) => true,
            (from, Ringing) => from.is_gate(),
            (from, next) => match (from.dismiss_rank(), next.dismiss_rank()) {
                (Some(a), Some(b)) => b > a && next != Rearmed,
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DismissStage::*;
    use super::*;

    #[test]
    fn terminal_stages_are_final() {
        for to in [Ringing, PuzzleForDismiss, Scored, Rearmed, Rescheduled] {
            assert!(!Rescheduled.can_transition_to(to));
            assert!(!Rearmed.can_transition_to(to));
        }
    }

    #[test]
    fn full_dismiss_path_is_legal() {
        let path = [
            Ringing,
            PuzzleForDismiss,
            HeartRateCheck,
            RecallCheck,
            Scored,
            Rearmed,
        ];
        for w in path.windows(2) {
            assert!(w[0].can_transition_to(w[1]), "{:?} -> {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn optional_stages_can_be_skipped() {
        assert!(PuzzleForDismiss.can_transition_to(Scored));
        assert!(PuzzleForDismiss.can_transition_to(RecallCheck));
        assert!(HeartRateCheck.can_transition_to(Scored));
        assert!(Ringing.can_transition_to(Scored));
    }

    #[test]
    fn dismiss_branch_never_goes_backwards() {
        assert!(!RecallCheck.can_transition_to(HeartRateCheck));
        assert!(!Scored.can_transition_to(PuzzleForDismiss));
        assert!(!HeartRateCheck.can_transition_to(PuzzleForDismiss));
    }

    #[test]
    fn only_scored_reaches_rearmed() {
        assert!(!Ringing.can_transition_to(Rearmed));
        assert!(!PuzzleForDismiss.can_transition_to(Rearmed));
        assert!(!RecallCheck.can_transition_to(Rearmed));
        assert!(Scored.can_transition_to(Rearmed));
    }

    #[test]
    fn branches_do_not_cross() {
        assert!(!PuzzleForSnooze.can_transition_to(Scored));
        assert!(!PuzzleForDismiss.can_transition_to(Rescheduled));
        assert!(!Scored.can_transition_to(Rescheduled));
    }

    #[test]
    fn unfinished_gates_fall_back_to_ringing() {
        for from in [PuzzleForSnooze, PuzzleForDismiss, HeartRateCheck, RecallCheck, Scored] {
            assert!(from.can_transition_to(Ringing), "{from:?}");
        }
        assert!(!Ringing.can_transition_to(Ringing));
    }

    #[test]
    fn gate_mapping() {
        assert_eq!(PuzzleForSnooze.gate(), Some(Gate::Puzzle));
        assert_eq!(HeartRateCheck.gate(), Some(Gate::HeartRate));
        assert_eq!(RecallCheck.gate(), Some(Gate::Recall));
        assert_eq!(Scored.gate(), None);
        assert!(!Ringing.is_gate());
    }
}
