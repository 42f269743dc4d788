//! Level configuration (read-only input owned by the campaign data)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::state::Value;
use crate::consts::{DEFAULT_CANVAS_SIZE, DEFAULT_MAX_BLOCKS};

/// Game mode selector (`type` in level JSON)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Maze,
    Turtle,
    #[serde(alias = "memory")]
    Math,
    Equation,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Maze => "maze",
            GameMode::Turtle => "turtle",
            GameMode::Math => "math",
            GameMode::Equation => "equation",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Starting pose (`dir` is a maze heading or turtle degrees depending on mode)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StartPos {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub dir: f64,
}

/// Turtle drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_SIZE,
            height: DEFAULT_CANVAS_SIZE,
        }
    }
}

fn default_variable() -> String {
    "x".to_string()
}

fn default_sign() -> String {
    "=".to_string()
}

fn default_true() -> bool {
    true
}

/// Authored equation for Equation levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationSpec {
    pub lhs: String,
    pub rhs: String,
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Relation symbol: `=`, `<`, `>`, `<=`, `>=`
    #[serde(default = "default_sign")]
    pub sign: String,
    /// Render products as `2x` rather than `2*x`
    #[serde(default = "default_true")]
    pub implicit: bool,
}

/// What a MemoryMath target variable must equal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expect {
    /// A literal value
    Value(Value),
    /// The current value of another variable
    Variable(String),
}

/// A MemoryMath victory target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub var: String,
    #[serde(flatten)]
    pub expect: Expect,
}

/// Complete level description.
///
/// Every mode reads only the sections it needs; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub mode: GameMode,
    /// Maze cells, indexed `grid[y][x]`
    #[serde(default)]
    pub grid: Vec<Vec<u8>>,
    #[serde(default)]
    pub start_pos: Option<StartPos>,
    #[serde(default)]
    pub allowed_blocks: Vec<String>,
    /// Initial variable bindings (MemoryMath)
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    #[serde(default)]
    pub hidden_vars: Vec<String>,
    #[serde(default)]
    pub locked_vars: Vec<String>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub max_blocks: Option<u32>,
    #[serde(default)]
    pub equation: Option<EquationSpec>,
    #[serde(default)]
    pub canvas: Option<Canvas>,
    /// Authored reference solution, already compiled to actions
    #[serde(default)]
    pub solution: Vec<Action>,
}

impl LevelConfig {
    /// Block-count target for the star rating
    pub fn target_blocks(&self) -> u32 {
        self.max_blocks.unwrap_or(DEFAULT_MAX_BLOCKS)
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas.unwrap_or_default()
    }

    /// Variable may not be written by the learner
    pub fn is_protected(&self, var: &str) -> bool {
        self.locked_vars.iter().any(|v| v == var) || self.hidden_vars.iter().any(|v| v == var)
    }
}
