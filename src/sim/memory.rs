//! Variable-memory sandbox (MemoryMath mode)

use super::action::{Action, ActionKind};
use super::env::{Environment, StepResult};
use super::level::{Expect, GameMode, LevelConfig};
use super::reference::ReferenceModel;
use super::state::{MemoryState, WorldState};
use crate::error::SimulationFault;

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryEnv;

impl MemoryEnv {
    fn initial(&self, level: &LevelConfig) -> MemoryState {
        MemoryState {
            variables: level.inputs.clone(),
            logs: Vec::new(),
        }
    }

    fn apply(&self, prior: &MemoryState, action: &Action, level: &LevelConfig) -> MemoryState {
        let mut next = prior.clone();
        match &action.kind {
            ActionKind::Set { var, .. } if level.is_protected(var) => {
                log::debug!("Rejected write to protected variable '{}'", var);
                next.logs.push(format!("Error: variable '{}' is locked", var));
            }
            ActionKind::Set { var, val } => {
                next.logs.push(format!("{} = {}", var, val));
                next.variables.insert(var.clone(), val.clone());
            }
            ActionKind::Print { msg } => next.logs.push(msg.clone()),
            _ => {}
        }
        next
    }
}

impl Environment for MemoryEnv {
    fn mode(&self) -> GameMode {
        GameMode::Math
    }

    fn step(
        &self,
        prior: Option<&WorldState>,
        action: Option<&Action>,
        level: &LevelConfig,
    ) -> Result<StepResult, SimulationFault> {
        let initial;
        let prior = match prior {
            Some(WorldState::Math(memory)) => memory,
            Some(other) => return Err(self.mismatch(other)),
            None => {
                initial = self.initial(level);
                &initial
            }
        };
        let next = match action {
            Some(action) => self.apply(prior, action, level),
            None => prior.clone(),
        };
        Ok(StepResult::running(WorldState::Math(next)))
    }

    /// Every target must match; targets may point at each other by name.
    fn check_victory(
        &self,
        state: &WorldState,
        level: &LevelConfig,
        _reference: Option<&ReferenceModel>,
    ) -> Result<bool, SimulationFault> {
        let WorldState::Math(memory) = state else {
            return Err(self.mismatch(state));
        };

        let satisfied = level.targets.iter().all(|target| {
            let Some(actual) = memory.variables.get(&target.var) else {
                return false;
            };
            match &target.expect {
                Expect::Value(expected) => actual.loose_eq(expected),
                Expect::Variable(other) => memory
                    .variables
                    .get(other)
                    .is_some_and(|expected| actual.loose_eq(expected)),
            }
        });
        Ok(satisfied)
    }
}
