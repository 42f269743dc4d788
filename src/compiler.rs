//! Boundary with the external block-to-action code generator
//!
//! The engine does not read block programs. It asks an [`ActionCompiler`] for
//! a flat, already-unrolled action list every time a fresh run starts.

use serde::{Deserialize, Serialize};

use crate::consts::LOOP_ITERATION_BUDGET;
use crate::error::CompileError;
use crate::sim::Action;

/// Output of one compilation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledProgram {
    pub actions: Vec<Action>,
    /// Blocks in the learner's program; drives the star rating
    pub block_count: u32,
}

impl CompiledProgram {
    pub fn new(actions: Vec<Action>, block_count: u32) -> Self {
        Self {
            actions,
            block_count,
        }
    }

    /// One block per action
    pub fn from_actions(actions: Vec<Action>) -> Self {
        let block_count = u32::try_from(actions.len()).unwrap_or(u32::MAX);
        Self::new(actions, block_count)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Program file accepted by the headless runner: either a bare action array
/// or `{ "actions": [...], "blockCount": n }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProgramFile {
    Bare(Vec<Action>),
    Full {
        actions: Vec<Action>,
        #[serde(default, rename = "blockCount")]
        block_count: Option<u32>,
    },
}

impl CompiledProgram {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        let file: ProgramFile = serde_json::from_str(json)
            .map_err(|e| CompileError::new(format!("unreadable program: {}", e)))?;
        Ok(match file {
            ProgramFile::Bare(actions) => Self::from_actions(actions),
            ProgramFile::Full {
                actions,
                block_count: Some(count),
            } => Self::new(actions, count),
            ProgramFile::Full { actions, .. } => Self::from_actions(actions),
        })
    }
}

/// Produces the action list for the learner's current program.
///
/// Called on every fresh `run`/`step_forward`; a resume does not recompile.
pub trait ActionCompiler {
    fn compile(&mut self) -> Result<CompiledProgram, CompileError>;
}

impl<F> ActionCompiler for F
where
    F: FnMut() -> Result<CompiledProgram, CompileError>,
{
    fn compile(&mut self) -> Result<CompiledProgram, CompileError> {
        self()
    }
}

/// A fixed program, for hosts that compile ahead of time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StaticProgram(pub CompiledProgram);

impl StaticProgram {
    pub fn new(program: CompiledProgram) -> Self {
        Self(program)
    }

    /// Swap in an edited program; picked up by the next fresh run
    pub fn replace(&mut self, program: CompiledProgram) {
        self.0 = program;
    }
}

impl ActionCompiler for StaticProgram {
    fn compile(&mut self) -> Result<CompiledProgram, CompileError> {
        Ok(self.0.clone())
    }
}

/// Loop guard for generators that unroll `repeat`/`while` blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationBudget {
    remaining: u32,
}

impl Default for IterationBudget {
    fn default() -> Self {
        Self::new(LOOP_ITERATION_BUDGET)
    }
}

impl IterationBudget {
    pub fn new(limit: u32) -> Self {
        Self { remaining: limit }
    }

    /// Spend one iteration, failing once the budget is gone
    pub fn tick(&mut self, block_id: Option<&str>) -> Result<(), CompileError> {
        if self.remaining == 0 {
            let message = "loop exceeded its iteration budget";
            return Err(match block_id {
                Some(id) => CompileError::at_block(message, id),
                None => CompileError::new(message),
            });
        }
        self.remaining -= 1;
        Ok(())
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
