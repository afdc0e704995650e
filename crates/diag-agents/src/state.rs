//! Workflow phase machine — explicit phases and legal transition guards.
//!
//! The debugging loop drives its phases through this typed model so that:
//! 1. Every phase transition is auditable and logged.
//! 2. Illegal transitions surface as errors instead of silent misbehavior.
//! 3. A finished run's phase sequence can be reconstructed from the log.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Phases of the plan-execute-reflect workflow.
///
/// Every run starts at `Planning` and terminates at `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Generating the initial plan from the user goal.
    Planning,
    /// Running one instruction against the tool-capable executor.
    Executing,
    /// Asking the step critic whether the previous step succeeded.
    Critiquing,
    /// Asking the goal judge whether the overall goal is met.
    Judging,
    /// Asking the reflection planner for the next instruction.
    Reflecting,
    /// Producing the final report from accumulated findings.
    Summarizing,
    /// Report delivered — terminal phase.
    Done,
    /// Terminal error — terminal phase.
    Failed,
}

impl Phase {
    /// Whether this is a terminal phase (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => write!(f, "Planning"),
            Self::Executing => write!(f, "Executing"),
            Self::Critiquing => write!(f, "Critiquing"),
            Self::Judging => write!(f, "Judging"),
            Self::Reflecting => write!(f, "Reflecting"),
            Self::Summarizing => write!(f, "Summarizing"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Legal transitions between workflow phases.
///
/// ```text
/// Planning    → Executing | Summarizing
/// Executing   → Critiquing | Summarizing
/// Critiquing  → Judging
/// Judging     → Reflecting | Summarizing
/// Reflecting  → Executing
/// Summarizing → Done
/// ```
fn is_legal_transition(from: Phase, to: Phase) -> bool {
    use Phase::*;

    // Any non-terminal phase can transition to Failed.
    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Planning, Executing)
            // A zero step budget skips straight to summarization
            | (Planning, Summarizing)
            // Normal path: each executed step is critiqued on the next pass.
            | (Executing, Critiquing)
            // Step budget exhausted: summarize whatever was accumulated.
            | (Executing, Summarizing)
            | (Critiquing, Judging)
            // Goal met → summarize; goal unmet → reflect on the next step.
            | (Judging, Summarizing)
            | (Judging, Reflecting)
            | (Reflecting, Executing)
            | (Summarizing, Done)
    )
}

/// A single recorded phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Phase,
    pub to: Phase,
    /// Loop iteration at the time of transition (0 before the loop starts).
    pub iteration: u32,
    /// Milliseconds since the machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: Phase,
    pub to: Phase,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal phase transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

impl From<IllegalTransition> for crate::contracts::WorkflowError {
    fn from(err: IllegalTransition) -> Self {
        crate::contracts::WorkflowError::new(format!("Workflow state error: {err}."))
    }
}

/// The workflow phase machine.
///
/// Tracks the current phase, enforces legal transitions, and keeps a complete
/// transition log for diagnostics.
pub struct PhaseMachine {
    current: Phase,
    iteration: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl PhaseMachine {
    /// Create a new machine starting at `Planning`.
    pub fn new() -> Self {
        Self {
            current: Phase::Planning,
            iteration: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Set the iteration counter (called by the loop each pass).
    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    /// Attempt to advance to the next phase.
    pub fn advance(&mut self, to: Phase, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, iteration = self.iteration, "phase transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            iteration: self.iteration,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Transition to `Failed` from any non-terminal phase.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(Phase::Failed, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line summary of the machine's history.
    pub fn summary(&self) -> String {
        let path: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        format!(
            "{} -> {} ({} transitions{})",
            Phase::Planning,
            self.current,
            self.transitions.len(),
            if path.is_empty() {
                String::new()
            } else {
                format!("; {}", path.join(" -> "))
            }
        )
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase() {
        let machine = PhaseMachine::new();
        assert_eq!(machine.current(), Phase::Planning);
        assert!(!machine.is_terminal());
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn goal_met_path() {
        let mut machine = PhaseMachine::new();

        machine.advance(Phase::Executing, Some("first planned step")).unwrap();
        machine.set_iteration(1);
        machine.advance(Phase::Critiquing, None).unwrap();
        machine.advance(Phase::Judging, None).unwrap();
        machine.advance(Phase::Summarizing, Some("goal met")).unwrap();
        machine.advance(Phase::Done, None).unwrap();

        assert!(machine.is_terminal());
        assert_eq!(machine.current(), Phase::Done);
        assert_eq!(machine.transitions().len(), 5);
    }

    #[test]
    fn reflection_loop_path() {
        let mut machine = PhaseMachine::new();

        machine.advance(Phase::Executing, None).unwrap();
        machine.set_iteration(1);
        machine.advance(Phase::Critiquing, None).unwrap();
        machine.advance(Phase::Judging, None).unwrap();
        machine.advance(Phase::Reflecting, Some("goal unmet")).unwrap();
        machine.advance(Phase::Executing, None).unwrap();
        // Budget exhausted after this execution.
        machine.advance(Phase::Summarizing, Some("step budget exhausted")).unwrap();
        machine.advance(Phase::Done, None).unwrap();

        assert!(machine.is_terminal());
    }

    #[test]
    fn zero_step_budget_skips_to_summarizing() {
        let mut machine = PhaseMachine::new();
        machine.advance(Phase::Summarizing, Some("zero step budget")).unwrap();
        machine.advance(Phase::Done, None).unwrap();
        assert!(machine.is_terminal());
    }

    #[test]
    fn failure_reachable_from_any_non_terminal_phase() {
        for phase in [
            Phase::Planning,
            Phase::Executing,
            Phase::Critiquing,
            Phase::Judging,
            Phase::Reflecting,
            Phase::Summarizing,
        ] {
            let mut machine = PhaseMachine {
                current: phase,
                iteration: 0,
                created_at: Instant::now(),
                transitions: Vec::new(),
            };
            machine.fail("test failure").unwrap();
            assert_eq!(machine.current(), Phase::Failed);
        }
    }

    #[test]
    fn terminal_phases_reject_transitions() {
        let mut machine = PhaseMachine::new();
        machine.advance(Phase::Summarizing, None).unwrap();
        machine.advance(Phase::Done, None).unwrap();

        let err = machine.advance(Phase::Executing, None).unwrap_err();
        assert_eq!(err.from, Phase::Done);
        assert_eq!(err.to, Phase::Executing);
        assert!(machine.fail("nope").is_err());
    }

    #[test]
    fn judging_requires_critique_first() {
        let mut machine = PhaseMachine::new();
        machine.advance(Phase::Executing, None).unwrap();
        let err = machine.advance(Phase::Judging, None).unwrap_err();
        assert_eq!(err.from, Phase::Executing);
    }

    #[test]
    fn transition_record_serde_roundtrip() {
        let record = TransitionRecord {
            from: Phase::Judging,
            to: Phase::Reflecting,
            iteration: 2,
            elapsed_ms: 1234,
            reason: Some("goal unmet".into()),
        };
        let json = serde_json::to_string(&record).unwrap();
        let restored: TransitionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.from, Phase::Judging);
        assert_eq!(restored.to, Phase::Reflecting);
        assert_eq!(restored.iteration, 2);
    }

    #[test]
    fn summary_names_the_path() {
        let mut machine = PhaseMachine::new();
        machine.advance(Phase::Executing, None).unwrap();
        machine.fail("bad response").unwrap();
        let summary = machine.summary();
        assert!(summary.contains("Failed"));
        assert!(summary.contains("2 transitions"));
    }
}
