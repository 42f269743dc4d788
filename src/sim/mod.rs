//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - World state is a fold of `step` over the action prefix
//! - No wall clock (timers come from a `Scheduler`)
//! - No randomness
//! - Stable iteration order (`BTreeMap` everywhere)
//! - No rendering or platform dependencies

pub mod action;
pub mod algebra;
pub mod engine;
pub mod env;
pub mod equation;
pub mod level;
pub mod maze;
pub mod memory;
pub mod outcome;
pub mod raster;
pub mod reference;
pub mod schedule;
pub mod state;
pub mod turtle;

pub use action::{Action, ActionKind, Operator, PenState};
pub use engine::{EngineEvent, EngineView, SimulationEngine};
pub use env::{Environment, EnvironmentRegistry, StepResult, StepStatus, replay};
pub use equation::EquationEnv;
pub use level::{Canvas, EquationSpec, Expect, GameMode, LevelConfig, StartPos, Target};
pub use maze::MazeEnv;
pub use memory::MemoryEnv;
pub use outcome::{RunOutcome, RunStatus, star_rating};
pub use reference::ReferenceModel;
pub use schedule::{Scheduler, TimerId, VirtualClock, settle_delay, tick_delay};
pub use state::{
    AppliedOp, EquationState, EquationStep, MazeState, MemoryState, Relation, Segment,
    TurtleState, Value, Verification, WorldState,
};
pub use turtle::TurtleEnv;
