//! Environment plugin contract, registry and the replay fold
//!
//! An environment is a pure transition function plus a victory predicate.
//! `step(None, None, level)` yields the initial state; that convention seeds
//! time travel and the reference runner.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::action::Action;
use super::equation::EquationEnv;
use super::level::{GameMode, LevelConfig};
use super::maze::MazeEnv;
use super::memory::MemoryEnv;
use super::reference::ReferenceModel;
use super::state::WorldState;
use super::turtle::TurtleEnv;
use crate::error::{FaultKind, ReplayFault, SimulationFault};

/// Status reported by a single transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Win,
    Lost,
}

/// Output of [`Environment::step`]
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub state: WorldState,
    pub status: StepStatus,
}

impl StepResult {
    pub fn running(state: WorldState) -> Self {
        Self {
            state,
            status: StepStatus::Running,
        }
    }
}

/// A game mode.
///
/// Implementations must be pure: same inputs, same outputs, and `prior` is
/// never mutated. Unknown action kinds fall through as no-ops.
pub trait Environment: fmt::Debug + Send + Sync {
    fn mode(&self) -> GameMode;

    fn step(
        &self,
        prior: Option<&WorldState>,
        action: Option<&Action>,
        level: &LevelConfig,
    ) -> Result<StepResult, SimulationFault>;

    fn check_victory(
        &self,
        state: &WorldState,
        level: &LevelConfig,
        reference: Option<&ReferenceModel>,
    ) -> Result<bool, SimulationFault>;

    fn initial_state(&self, level: &LevelConfig) -> Result<WorldState, SimulationFault> {
        self.step(None, None, level).map(|result| result.state)
    }

    fn fault(&self, kind: FaultKind) -> SimulationFault {
        SimulationFault::new(self.mode(), kind)
    }

    fn mismatch(&self, found: &WorldState) -> SimulationFault {
        self.fault(FaultKind::StateMismatch {
            expected: self.mode(),
            found: found.mode(),
        })
    }
}

/// Fold `step` over `actions` from the initial state.
///
/// SCAN actions consume their slot without a transition. This is the only
/// way world state is rebuilt: there are no snapshots to restore.
pub fn replay(
    env: &dyn Environment,
    level: &LevelConfig,
    actions: &[Action],
) -> Result<WorldState, ReplayFault> {
    let mut state = env.initial_state(level).map_err(|f| f.at_step(0))?;
    for (index, action) in actions.iter().enumerate() {
        if action.is_scan() {
            continue;
        }
        state = env
            .step(Some(&state), Some(action), level)
            .map_err(|f| f.at_step(index))?
            .state;
    }
    Ok(state)
}

/// Environments available to the engine, built once by the host at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    envs: BTreeMap<GameMode, Arc<dyn Environment>>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four shipped modes
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MazeEnv));
        registry.register(Arc::new(TurtleEnv));
        registry.register(Arc::new(MemoryEnv));
        registry.register(Arc::new(EquationEnv));
        registry
    }

    /// Register (or replace) the environment for its mode
    pub fn register(&mut self, env: Arc<dyn Environment>) {
        let mode = env.mode();
        if self.envs.insert(mode, env).is_some() {
            log::debug!("Replaced {} environment", mode);
        }
    }

    pub fn get(&self, mode: GameMode) -> Option<Arc<dyn Environment>> {
        self.envs.get(&mode).cloned()
    }

    pub fn modes(&self) -> impl Iterator<Item = GameMode> + '_ {
        self.envs.keys().copied()
    }
}
