//! Compiled actions
//!
//! Produced by the external block compiler; the engine never mutates them.

use serde::{Deserialize, Serialize};

use super::state::Value;

/// Pen position for turtle `PEN` actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenState {
    Up,
    Down,
}

/// Arithmetic applied to both sides of an equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+", alias = "add")]
    Add,
    #[serde(rename = "-", alias = "subtract")]
    Subtract,
    #[serde(rename = "*", alias = "multiply")]
    Multiply,
    #[serde(rename = "/", alias = "divide")]
    Divide,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }
}

/// Mode-specific action payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Maze: one cell forward. Turtle: `dist` units along the heading.
    Move {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dist: Option<f64>,
    },
    TurnLeft,
    TurnRight,
    /// Turtle: rotate by `angle` degrees
    Turn { angle: f64 },
    Pen { state: PenState },
    Color { color: String },
    Set { var: String, val: Value },
    Print { msg: String },
    OpBoth { operator: Operator, value: String },
    /// Sensor visualization only; consumes a step without touching state
    Scan,
    /// Types this build does not know about play back as no-ops
    #[serde(other)]
    Unknown,
}

/// One resolved instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Originating block, for UI highlighting only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { id: None, kind }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_scan(&self) -> bool {
        matches!(self.kind, ActionKind::Scan)
    }

    // Shorthand constructors used by generators and tests

    pub fn step() -> Self {
        Self::new(ActionKind::Move { dist: None })
    }

    pub fn forward(dist: f64) -> Self {
        Self::new(ActionKind::Move { dist: Some(dist) })
    }

    pub fn turn_left() -> Self {
        Self::new(ActionKind::TurnLeft)
    }

    pub fn turn_right() -> Self {
        Self::new(ActionKind::TurnRight)
    }

    pub fn turn(angle: f64) -> Self {
        Self::new(ActionKind::Turn { angle })
    }

    pub fn pen(state: PenState) -> Self {
        Self::new(ActionKind::Pen { state })
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self::new(ActionKind::Color {
            color: color.into(),
        })
    }

    pub fn set(var: impl Into<String>, val: impl Into<Value>) -> Self {
        Self::new(ActionKind::Set {
            var: var.into(),
            val: val.into(),
        })
    }

    pub fn print(msg: impl Into<String>) -> Self {
        Self::new(ActionKind::Print { msg: msg.into() })
    }

    pub fn op_both(operator: Operator, value: impl Into<String>) -> Self {
        Self::new(ActionKind::OpBoth {
            operator,
            value: value.into(),
        })
    }

    pub fn scan() -> Self {
        Self::new(ActionKind::Scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compiler_output() {
        let json = r#"[
            { "type": "MOVE", "id": "b1" },
            { "type": "TURN_LEFT" },
            { "type": "MOVE", "dist": 50 },
            { "type": "SET", "var": "x", "val": [1, 2] },
            { "type": "OP_BOTH", "operator": "/", "value": "2" },
            { "type": "SCAN", "id": "radar" }
        ]"#;
        let actions: Vec<Action> = serde_json::from_str(json).unwrap();
        assert_eq!(actions[0], Action::step().with_id("b1"));
        assert_eq!(actions[1].kind, ActionKind::TurnLeft);
        assert_eq!(actions[2], Action::forward(50.0));
        assert_eq!(
            actions[3],
            Action::set("x", Value::List(vec![Value::Number(1.0), Value::Number(2.0)]))
        );
        assert_eq!(actions[4], Action::op_both(Operator::Divide, "2"));
        assert!(actions[5].is_scan());
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let action: Action = serde_json::from_str(r#"{ "type": "TELEPORT", "id": "b9" }"#).unwrap();
        assert_eq!(action.kind, ActionKind::Unknown);
        assert_eq!(action.id.as_deref(), Some("b9"));
    }
}
