//! Maze environment: a robot on a grid walking to a goal cell

use super::action::{Action, ActionKind};
use super::env::{Environment, StepResult, StepStatus};
use super::level::{GameMode, LevelConfig};
use super::reference::ReferenceModel;
use super::state::{MazeState, WorldState};
use crate::error::{FaultKind, SimulationFault};
use crate::heading_offset;

/// Cell codes
pub const CELL_WALL: u8 = 0;
pub const CELL_OPEN: u8 = 1;
pub const CELL_START: u8 = 2;
pub const CELL_GOAL: u8 = 3;

/// What the robot finds in the cell it tries to enter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Open,
    Goal,
    /// Blocked or outside the grid
    Wall,
}

pub fn cell_kind(grid: &[Vec<u8>], x: i32, y: i32) -> CellKind {
    if x < 0 || y < 0 {
        return CellKind::Wall;
    }
    let code = grid
        .get(y as usize)
        .and_then(|row| row.get(x as usize))
        .copied()
        .unwrap_or(CELL_WALL);
    match code {
        CELL_OPEN | CELL_START => CellKind::Open,
        CELL_GOAL => CellKind::Goal,
        _ => CellKind::Wall,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MazeEnv;

impl MazeEnv {
    fn initial(&self, level: &LevelConfig) -> Result<MazeState, SimulationFault> {
        if level.grid.is_empty() {
            return Err(self.fault(FaultKind::MissingConfig("grid")));
        }

        if let Some(start) = level.start_pos {
            return Ok(MazeState {
                x: start.x as i32,
                y: start.y as i32,
                dir: start.dir as i32,
            });
        }

        // No explicit start: first start cell in row-major order
        level
            .grid
            .iter()
            .enumerate()
            .find_map(|(y, row)| {
                row.iter()
                    .position(|&code| code == CELL_START)
                    .map(|x| MazeState {
                        x: x as i32,
                        y: y as i32,
                        dir: 0,
                    })
            })
            .ok_or_else(|| self.fault(FaultKind::InvalidGrid("no start cell".to_string())))
    }

    fn apply(&self, prior: &MazeState, action: &Action, level: &LevelConfig) -> (MazeState, StepStatus) {
        let mut next = *prior;
        match action.kind {
            ActionKind::Move { .. } => {
                let (dx, dy) = heading_offset(prior.dir);
                let (x, y) = (prior.x + dx, prior.y + dy);
                match cell_kind(&level.grid, x, y) {
                    // Bump: pose stays where it was
                    CellKind::Wall => return (next, StepStatus::Lost),
                    CellKind::Goal => {
                        next.x = x;
                        next.y = y;
                        return (next, StepStatus::Win);
                    }
                    CellKind::Open => {
                        next.x = x;
                        next.y = y;
                    }
                }
            }
            ActionKind::TurnLeft => next.dir -= 1,
            ActionKind::TurnRight => next.dir += 1,
            _ => {}
        }
        (next, StepStatus::Running)
    }
}

impl Environment for MazeEnv {
    fn mode(&self) -> GameMode {
        GameMode::Maze
    }

    fn step(
        &self,
        prior: Option<&WorldState>,
        action: Option<&Action>,
        level: &LevelConfig,
    ) -> Result<StepResult, SimulationFault> {
        let prior = match prior {
            Some(WorldState::Maze(maze)) => *maze,
            Some(other) => return Err(self.mismatch(other)),
            None => self.initial(level)?,
        };
        let Some(action) = action else {
            return Ok(StepResult::running(WorldState::Maze(prior)));
        };

        let (next, status) = self.apply(&prior, action, level);
        Ok(StepResult {
            state: WorldState::Maze(next),
            status,
        })
    }

    fn check_victory(
        &self,
        state: &WorldState,
        level: &LevelConfig,
        _reference: Option<&ReferenceModel>,
    ) -> Result<bool, SimulationFault> {
        match state {
            WorldState::Maze(maze) => Ok(cell_kind(&level.grid, maze.x, maze.y) == CellKind::Goal),
            other => Err(self.mismatch(other)),
        }
    }
}
