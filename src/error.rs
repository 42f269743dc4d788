//! Error types
//!
//! Outcomes (WON/LOST/FAILED) are not errors and never appear here.

use crate::sim::GameMode;

/// The external generator could not turn the block program into actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("compilation failed: {message}")]
pub struct CompileError {
    pub message: String,
    /// Source block that triggered the failure, when known
    pub block_id: Option<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            block_id: None,
        }
    }

    pub fn at_block(message: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            block_id: Some(block_id.into()),
        }
    }
}

/// What went wrong inside an environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaultKind {
    #[error("expected {expected} world state, found {found}")]
    StateMismatch { expected: GameMode, found: GameMode },

    #[error("level is missing its {0} section")]
    MissingConfig(&'static str),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("malformed expression `{expr}`: {reason}")]
    Expression { expr: String, reason: String },
}

/// A plugin failed. Indicates bad level data or a plugin defect, never learner error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{mode} simulation fault: {kind}")]
pub struct SimulationFault {
    pub mode: GameMode,
    #[source]
    pub kind: FaultKind,
}

impl SimulationFault {
    pub fn new(mode: GameMode, kind: FaultKind) -> Self {
        Self { mode, kind }
    }

    /// Attach the index of the action that was being applied
    pub fn at_step(self, step: usize) -> ReplayFault {
        ReplayFault { step, fault: self }
    }
}

/// A fault located at a specific action index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("action {step} faulted")]
pub struct ReplayFault {
    pub step: usize,
    #[source]
    pub fault: SimulationFault,
}

/// Errors surfaced by [`crate::sim::SimulationEngine`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("simulation fault during playback")]
    Fault(#[from] ReplayFault),

    #[error("engine setup failed")]
    Setup(#[source] ReplayFault),

    #[error("no compiled program to play back")]
    NoTimeline,

    #[error("no environment registered for {0}")]
    UnsupportedMode(GameMode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_chain() {
        let fault = SimulationFault::new(GameMode::Maze, FaultKind::MissingConfig("grid"));
        assert_eq!(
            fault.to_string(),
            "maze simulation fault: level is missing its grid section"
        );

        let located = fault.clone().at_step(3);
        assert_eq!(located.step, 3);
        assert_eq!(located.fault, fault);
    }

    #[test]
    fn test_compile_error_from() {
        let err: EngineError = CompileError::at_block("unbounded loop", "b7").into();
        assert!(matches!(err, EngineError::Compile(ref e) if e.block_id.as_deref() == Some("b7")));
        assert_eq!(err.to_string(), "compilation failed: unbounded loop");
    }
}
