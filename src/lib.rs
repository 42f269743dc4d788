//! Blocklab - deterministic replay engine for block-based puzzles
//!
//! Core modules:
//! - `sim`: Deterministic simulation (environments, replay, playback engine)
//! - `compiler`: Boundary with the external block-to-action code generator
//! - `proof`: Completion codes for finished levels
//! - `settings`: Playback preferences
//! - `platform`: Browser host bindings (wasm32 only)

pub mod compiler;
pub mod error;
pub mod platform;
pub mod proof;
pub mod settings;
pub mod sim;

pub use compiler::{ActionCompiler, CompiledProgram, StaticProgram};
pub use error::{CompileError, EngineError, FaultKind, ReplayFault, SimulationFault};
pub use settings::{Settings, SpeedPreset};

use glam::Vec2;

/// Engine configuration constants
pub mod consts {
    /// Shortest auto-play interval regardless of speed
    pub const MIN_TICK_DELAY_MS: u64 = 5;
    /// Interval added per unit the speed slider sits below 100
    pub const MS_PER_SPEED_UNIT: u64 = 10;
    /// Upper end of the speed slider
    pub const MAX_SPEED: u8 = 100;
    /// Equation steps stay on screen long enough to read
    pub const EQUATION_MIN_TICK_MS: u64 = 2500;
    /// Radar animation length for SCAN actions
    pub const SCAN_MIN_TICK_MS: u64 = 500;

    /// Delay before a WIN/LOST/verdict is committed (animation time)
    pub const SETTLE_DELAY_MS: u64 = 500;
    pub const EQUATION_SETTLE_DELAY_MS: u64 = 3000;

    /// Star rating defaults
    pub const DEFAULT_MAX_BLOCKS: u32 = 5;
    pub const TWO_STAR_FACTOR: f64 = 1.5;

    /// Turtle pixel-match grading
    pub const PIXEL_MATCH_THRESHOLD: f64 = 0.90;
    pub const TURTLE_STROKE_WIDTH: f32 = 4.0;
    pub const DEFAULT_CANVAS_SIZE: u32 = 400;
    pub const DEFAULT_PEN_COLOR: &str = "#000000";

    /// Iterations a generator may unroll before giving up
    pub const LOOP_ITERATION_BUDGET: u32 = 1000;
}

/// Maze heading reduced to 0..4 (East, South, West, North)
#[inline]
pub fn normalize_dir(dir: i32) -> usize {
    dir.rem_euclid(4) as usize
}

/// Grid offset for one step along a maze heading (y grows southward)
#[inline]
pub fn heading_offset(dir: i32) -> (i32, i32) {
    match normalize_dir(dir) {
        0 => (1, 0),
        1 => (0, 1),
        2 => (-1, 0),
        _ => (0, -1),
    }
}

/// Convert polar (distance, degrees) to a cartesian offset
#[inline]
pub fn polar_to_cartesian(dist: f64, degrees: f64) -> (f64, f64) {
    let theta = degrees.to_radians();
    (dist * theta.cos(), dist * theta.sin())
}

/// Point as a render-space vector
#[inline]
pub fn to_vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x as f32, y as f32)
}
