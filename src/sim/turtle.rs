//! Turtle graphics environment
//!
//! Graded by pixel coverage against the reference drawing.

use super::action::{Action, ActionKind, PenState};
use super::env::{Environment, StepResult};
use super::level::{GameMode, LevelConfig};
use super::raster::{Bitmap, coverage};
use super::reference::ReferenceModel;
use super::state::{Segment, TurtleState, WorldState};
use crate::consts::{DEFAULT_PEN_COLOR, PIXEL_MATCH_THRESHOLD, TURTLE_STROKE_WIDTH};
use crate::error::SimulationFault;
use crate::polar_to_cartesian;

#[derive(Debug, Clone, Copy, Default)]
pub struct TurtleEnv;

impl TurtleEnv {
    fn initial(&self, level: &LevelConfig) -> TurtleState {
        let canvas = level.canvas();
        let (x, y, dir) = match level.start_pos {
            Some(start) => (start.x, start.y, start.dir),
            None => (canvas.width as f64 / 2.0, canvas.height as f64 / 2.0, 0.0),
        };
        TurtleState {
            x,
            y,
            dir,
            pen_down: true,
            color: DEFAULT_PEN_COLOR.to_string(),
            lines: Vec::new(),
        }
    }

    fn apply(&self, prior: &TurtleState, action: &Action) -> TurtleState {
        let mut next = prior.clone();
        match &action.kind {
            ActionKind::Move { dist: Some(dist) } => {
                let (dx, dy) = polar_to_cartesian(*dist, prior.dir);
                next.x = prior.x + dx;
                next.y = prior.y + dy;
                if prior.pen_down {
                    next.lines.push(Segment {
                        x1: prior.x,
                        y1: prior.y,
                        x2: next.x,
                        y2: next.y,
                        color: prior.color.clone(),
                    });
                }
            }
            ActionKind::Turn { angle } => next.dir += angle,
            ActionKind::TurnLeft => next.dir -= 90.0,
            ActionKind::TurnRight => next.dir += 90.0,
            ActionKind::Pen { state } => next.pen_down = *state == PenState::Down,
            ActionKind::Color { color } => next.color = color.clone(),
            _ => {}
        }
        next
    }
}

impl Environment for TurtleEnv {
    fn mode(&self) -> GameMode {
        GameMode::Turtle
    }

    fn step(
        &self,
        prior: Option<&WorldState>,
        action: Option<&Action>,
        level: &LevelConfig,
    ) -> Result<StepResult, SimulationFault> {
        let initial;
        let prior = match prior {
            Some(WorldState::Turtle(turtle)) => turtle,
            Some(other) => return Err(self.mismatch(other)),
            None => {
                initial = self.initial(level);
                &initial
            }
        };
        let next = match action {
            Some(action) => self.apply(prior, action),
            None => prior.clone(),
        };
        Ok(StepResult::running(WorldState::Turtle(next)))
    }

    fn check_victory(
        &self,
        state: &WorldState,
        level: &LevelConfig,
        reference: Option<&ReferenceModel>,
    ) -> Result<bool, SimulationFault> {
        let WorldState::Turtle(turtle) = state else {
            return Err(self.mismatch(state));
        };
        let Some(reference) = reference else {
            log::warn!("Turtle level '{}' has no reference drawing", level.id);
            return Ok(false);
        };

        let canvas = level.canvas();
        let (width, height) = (canvas.width, canvas.height);
        let expected = Bitmap::rasterize(reference.lines(), width, height, TURTLE_STROKE_WIDTH);
        let drawn = Bitmap::rasterize(&turtle.lines, width, height, TURTLE_STROKE_WIDTH);
        let ratio = coverage(&expected, &drawn);
        log::debug!("Turtle coverage {:.3} (need {:.2})", ratio, PIXEL_MATCH_THRESHOLD);
        Ok(ratio >= PIXEL_MATCH_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::env::replay;

    fn level() -> LevelConfig {
        LevelConfig {
            mode: GameMode::Turtle,
            ..Default::default()
        }
    }

    fn turtle(state: &WorldState) -> &TurtleState {
        match state {
            WorldState::Turtle(t) => t,
            other => panic!("expected turtle state, got {:?}", other.mode()),
        }
    }

    #[test]
    fn test_initial_state_centered() {
        let state = TurtleEnv.initial_state(&level()).unwrap();
        let t = turtle(&state);
        assert_eq!((t.x, t.y, t.dir), (200.0, 200.0, 0.0));
        assert!(t.pen_down);
        assert!(t.lines.is_empty());
    }

    #[test]
    fn test_move_draws_segment() {
        let state = replay(&TurtleEnv, &level(), &[Action::forward(50.0)]).unwrap();
        let t = turtle(&state);
        assert!((t.x - 250.0).abs() < 1e-9);
        assert_eq!(t.lines.len(), 1);
        assert_eq!(t.lines[0].x1, 200.0);
        assert_eq!(t.lines[0].color, DEFAULT_PEN_COLOR);
    }

    #[test]
    fn test_turn_then_move() {
        let actions = [Action::turn(90.0), Action::forward(10.0)];
        let state = replay(&TurtleEnv, &level(), &actions).unwrap();
        let t = turtle(&state);
        assert!((t.x - 200.0).abs() < 1e-9);
        assert!((t.y - 210.0).abs() < 1e-9);
        assert_eq!(t.dir, 90.0);
    }

    #[test]
    fn test_heading_is_unbounded() {
        let actions = vec![Action::turn(270.0), Action::turn(180.0), Action::turn_left()];
        let state = replay(&TurtleEnv, &level(), &actions).unwrap();
        assert_eq!(turtle(&state).dir, 360.0);
    }

    #[test]
    fn test_pen_up_moves_without_ink() {
        let actions = vec![
            Action::pen(PenState::Up),
            Action::forward(20.0),
            Action::pen(PenState::Down),
            Action::color("red"),
            Action::forward(20.0),
        ];
        let state = replay(&TurtleEnv, &level(), &actions).unwrap();
        let t = turtle(&state);
        assert_eq!(t.lines.len(), 1);
        assert_eq!(t.lines[0].x1, 220.0);
        assert_eq!(t.lines[0].color, "red");
    }

    #[test]
    fn test_prior_state_is_not_mutated() {
        let lvl = level();
        let initial = TurtleEnv.initial_state(&lvl).unwrap();
        let snapshot = initial.clone();
        let _ = TurtleEnv.step(Some(&initial), Some(&Action::forward(5.0)), &lvl).unwrap();
        assert_eq!(initial, snapshot);
    }

    #[test]
    fn test_identical_drawing_wins() {
        let lvl = level();
        let solution = vec![Action::forward(100.0)];
        let reference = ReferenceModel::compute(&TurtleEnv, &lvl, &solution).unwrap();
        let drawn = replay(&TurtleEnv, &lvl, &solution).unwrap();
        assert!(TurtleEnv.check_victory(&drawn, &lvl, Some(&reference)).unwrap());
    }

    #[test]
    fn test_blank_drawing_fails() {
        let lvl = level();
        let solution = [Action::forward(100.0)];
        let reference = ReferenceModel::compute(&TurtleEnv, &lvl, &solution).unwrap();
        let blank = TurtleEnv.initial_state(&lvl).unwrap();
        assert!(!TurtleEnv.check_victory(&blank, &lvl, Some(&reference)).unwrap());
    }

    #[test]
    fn test_half_drawing_fails() {
        let lvl = level();
        let solution = [Action::forward(100.0)];
        let reference = ReferenceModel::compute(&TurtleEnv, &lvl, &solution).unwrap();
        let half = replay(&TurtleEnv, &lvl, &[Action::forward(50.0)]).unwrap();
        assert!(!TurtleEnv.check_victory(&half, &lvl, Some(&reference)).unwrap());
    }

    #[test]
    fn test_no_reference_fails() {
        let lvl = level();
        let drawn = replay(&TurtleEnv, &lvl, &[Action::forward(10.0)]).unwrap();
        assert!(!TurtleEnv.check_victory(&drawn, &lvl, None).unwrap());
    }
}
