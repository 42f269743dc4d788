//! Reference ("ghost") model computed from an authored solution

use serde::Serialize;

use super::action::Action;
use super::env::{Environment, replay};
use super::level::LevelConfig;
use super::state::{Segment, WorldState};
use crate::error::ReplayFault;

/// Final state of the authored solution, run headlessly through the same
/// `step` the learner's program uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceModel {
    state: WorldState,
    steps: usize,
}

impl ReferenceModel {
    pub fn compute(
        env: &dyn Environment,
        level: &LevelConfig,
        solution: &[Action],
    ) -> Result<Self, ReplayFault> {
        let state = replay(env, level, solution)?;
        log::debug!(
            "Reference model for '{}': {} actions, {} strokes",
            level.id,
            solution.len(),
            state.lines().len()
        );
        Ok(Self {
            state,
            steps: solution.len(),
        })
    }

    /// Build from the level's own `solution`, if it has one
    pub fn for_level(env: &dyn Environment, level: &LevelConfig) -> Result<Option<Self>, ReplayFault> {
        if level.solution.is_empty() {
            return Ok(None);
        }
        Self::compute(env, level, &level.solution).map(Some)
    }

    /// Overlay projection: the strokes of a turtle drawing
    pub fn lines(&self) -> &[Segment] {
        self.state.lines()
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}
