//! World state and per-mode snapshot types
//!
//! Every value here is a pure function of `(level, action prefix)`: no clocks,
//! no randomness, no I/O. Replaying the same prefix must rebuild the same state.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::Operator;
use super::level::GameMode;

/// Maze robot pose.
///
/// `dir` is intentionally unbounded (turns never wrap) so the renderer can
/// rotate the short way; use [`crate::normalize_dir`] for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeState {
    pub x: i32,
    pub y: i32,
    pub dir: i32,
}

/// A committed turtle stroke (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: String,
}

/// Turtle pen state and drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurtleState {
    pub x: f64,
    pub y: f64,
    /// Heading in degrees, unbounded
    pub dir: f64,
    pub pen_down: bool,
    pub color: String,
    pub lines: Vec<Segment>,
}

/// Variable value in the memory sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Deep equality for lists, loose numeric/string equality otherwise
    /// (`5 == "5"`, `"2.50" == 2.5`, `"" == 0`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            (Value::List(_), _) | (_, Value::List(_)) => false,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Number(n), Value::Text(s)) | (Value::Text(s), Value::Number(n)) => {
                let s = s.trim();
                // Blank text counts as 0
                if s.is_empty() {
                    return *n == 0.0;
                }
                s.parse::<f64>().is_ok_and(|v| v == *n)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Variable memory and console output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryState {
    pub variables: BTreeMap<String, Value>,
    pub logs: Vec<String>,
}

/// Relation between the two sides of an equation or inequality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl Relation {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "=" | "==" => Some(Relation::Eq),
            "<" => Some(Relation::Lt),
            ">" => Some(Relation::Gt),
            "<=" | "≤" => Some(Relation::Le),
            ">=" | "≥" => Some(Relation::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Lt => "<",
            Relation::Gt => ">",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        }
    }

    /// Relation after multiplying both sides by a negative number
    pub fn flipped(&self) -> Self {
        match self {
            Relation::Eq => Relation::Eq,
            Relation::Lt => Relation::Gt,
            Relation::Gt => Relation::Lt,
            Relation::Le => Relation::Ge,
            Relation::Ge => Relation::Le,
        }
    }

    /// Does `lhs <rel> rhs` hold given `lhs.cmp(rhs)`?
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Relation::Eq => ordering == Ordering::Equal,
            Relation::Lt => ordering == Ordering::Less,
            Relation::Gt => ordering == Ordering::Greater,
            Relation::Le => ordering != Ordering::Greater,
            Relation::Ge => ordering != Ordering::Less,
        }
    }
}

/// The sides as they were before an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationStep {
    pub lhs: String,
    pub sign: Relation,
    pub rhs: String,
}

/// Most recent `OP_BOTH`, kept for UI animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOp {
    pub operator: Operator,
    pub value: String,
    /// False when the simplifier could not represent the result
    pub applied: bool,
}

/// Check of a solved value against the authored equation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub value: String,
    pub lhs: String,
    pub rhs: String,
    pub holds: bool,
}

/// Equation solver state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquationState {
    pub lhs: String,
    pub rhs: String,
    pub sign: Relation,
    pub implicit: bool,
    pub history: Vec<EquationStep>,
    pub last_op: Option<AppliedOp>,
    pub verification: Option<Verification>,
}

/// Snapshot of whichever game mode is active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WorldState {
    Maze(MazeState),
    Turtle(TurtleState),
    Math(MemoryState),
    Equation(EquationState),
}

impl WorldState {
    pub fn mode(&self) -> GameMode {
        match self {
            WorldState::Maze(_) => GameMode::Maze,
            WorldState::Turtle(_) => GameMode::Turtle,
            WorldState::Math(_) => GameMode::Math,
            WorldState::Equation(_) => GameMode::Equation,
        }
    }

    /// Committed strokes (empty outside turtle mode)
    pub fn lines(&self) -> &[Segment] {
        match self {
            WorldState::Turtle(turtle) => &turtle.lines,
            _ => &[],
        }
    }
}
