//! Equation solver environment
//!
//! The learner applies the same operation to both sides until the variable
//! stands alone. Sides are stored as canonical text from [`super::algebra`],
//! so replaying a prefix always rebuilds byte-identical strings.

use super::action::{Action, ActionKind, Operator};
use super::algebra::{self, AlgebraError, Poly, Rational};
use super::env::{Environment, StepResult, StepStatus};
use super::level::{EquationSpec, GameMode, LevelConfig};
use super::reference::ReferenceModel;
use super::state::{AppliedOp, EquationState, EquationStep, Relation, Verification, WorldState};
use crate::error::{FaultKind, SimulationFault};

/// Why an `OP_BOTH` left the sides untouched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    Algebra(#[from] AlgebraError),
    #[error("multiplying both sides by zero loses the equation")]
    ZeroFactor,
    #[error("an inequality can only be scaled by a constant")]
    VariableFactor,
}

/// Value of `x` when one side is exactly `x` and the other a number
pub fn solved_value(lhs: &Poly, rhs: &Poly) -> Option<Rational> {
    if lhs.is_bare_variable() {
        rhs.as_constant()
    } else if rhs.is_bare_variable() {
        lhs.as_constant()
    } else {
        None
    }
}

/// Apply `operator value` to both sides, returning the new sides and relation.
pub fn apply_both(
    lhs: &Poly,
    rhs: &Poly,
    sign: Relation,
    operator: Operator,
    operand: &Poly,
) -> Result<(Poly, Poly, Relation), Rejection> {
    let scales = matches!(operator, Operator::Multiply | Operator::Divide);
    let mut sign = sign;
    if scales && sign != Relation::Eq {
        let factor = operand.as_constant().ok_or(Rejection::VariableFactor)?;
        if factor.is_negative() {
            sign = sign.flipped();
        }
    }

    let (lhs, rhs) = match operator {
        Operator::Add => (lhs.add(operand)?, rhs.add(operand)?),
        Operator::Subtract => (lhs.sub(operand)?, rhs.sub(operand)?),
        Operator::Multiply => {
            if operand.as_constant() == Some(Rational::ZERO) {
                return Err(Rejection::ZeroFactor);
            }
            (lhs.mul(operand)?, rhs.mul(operand)?)
        }
        Operator::Divide => (lhs.div(operand)?, rhs.div(operand)?),
    };
    Ok((lhs, rhs, sign))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EquationEnv;

impl EquationEnv {
    fn spec<'a>(&self, level: &'a LevelConfig) -> Result<&'a EquationSpec, SimulationFault> {
        level
            .equation
            .as_ref()
            .ok_or_else(|| self.fault(FaultKind::MissingConfig("equation")))
    }

    fn expression_fault(&self, text: &str, err: AlgebraError) -> SimulationFault {
        self.fault(FaultKind::Expression {
            expr: text.to_string(),
            reason: err.to_string(),
        })
    }

    fn parse_side(&self, text: &str, var: &str) -> Result<Poly, SimulationFault> {
        algebra::parse(text, var).map_err(|err| self.expression_fault(text, err))
    }

    /// Authored side in canonical form
    fn normalize_side(&self, spec: &EquationSpec, text: &str) -> Result<String, SimulationFault> {
        algebra::simplify(text, &spec.variable, spec.implicit)
            .map_err(|err| self.expression_fault(text, err))
    }

    fn relation(&self, spec: &EquationSpec) -> Result<Relation, SimulationFault> {
        Relation::parse(&spec.sign).ok_or_else(|| {
            self.fault(FaultKind::Expression {
                expr: spec.sign.clone(),
                reason: "unknown relation".to_string(),
            })
        })
    }

    fn initial(&self, level: &LevelConfig) -> Result<EquationState, SimulationFault> {
        let spec = self.spec(level)?;
        Ok(EquationState {
            lhs: self.normalize_side(spec, &spec.lhs)?,
            rhs: self.normalize_side(spec, &spec.rhs)?,
            sign: self.relation(spec)?,
            implicit: spec.implicit,
            history: Vec::new(),
            last_op: None,
            verification: None,
        })
    }

    /// Substitute `value` into the authored equation
    fn verify(&self, spec: &EquationSpec, value: Rational) -> Result<Verification, SimulationFault> {
        let var = spec.variable.as_str();
        let lhs = self.parse_side(&spec.lhs, var)?.eval(value);
        let rhs = self.parse_side(&spec.rhs, var)?.eval(value);
        let show = |side: &Result<Rational, AlgebraError>| match side {
            Ok(v) => v.to_string(),
            Err(_) => "undefined".to_string(),
        };
        let holds = match (&lhs, &rhs) {
            (Ok(l), Ok(r)) => Relation::Eq.holds(l.cmp(r)),
            _ => false,
        };
        Ok(Verification {
            value: value.to_string(),
            lhs: show(&lhs),
            rhs: show(&rhs),
            holds,
        })
    }

    fn apply(
        &self,
        prior: &EquationState,
        operator: Operator,
        value: &str,
        level: &LevelConfig,
    ) -> Result<(EquationState, StepStatus), SimulationFault> {
        let spec = self.spec(level)?;
        let var = spec.variable.as_str();
        let lhs = self.parse_side(&prior.lhs, var)?;
        let rhs = self.parse_side(&prior.rhs, var)?;

        let mut next = prior.clone();
        next.history.push(EquationStep {
            lhs: prior.lhs.clone(),
            sign: prior.sign,
            rhs: prior.rhs.clone(),
        });

        let outcome = algebra::parse(value, var)
            .map_err(Rejection::from)
            .and_then(|operand| apply_both(&lhs, &rhs, prior.sign, operator, &operand));
        let (lhs, rhs, sign) = match outcome {
            Ok(sides) => sides,
            Err(reason) => {
                log::debug!("Rejected {} {}: {}", operator.symbol(), value, reason);
                next.last_op = Some(AppliedOp {
                    operator,
                    value: value.to_string(),
                    applied: false,
                });
                return Ok((next, StepStatus::Running));
            }
        };

        next.lhs = lhs.render(var, prior.implicit);
        next.rhs = rhs.render(var, prior.implicit);
        next.sign = sign;
        next.last_op = Some(AppliedOp {
            operator,
            value: value.to_string(),
            applied: true,
        });

        let Some(solution) = solved_value(&lhs, &rhs) else {
            return Ok((next, StepStatus::Running));
        };
        // Inequalities have a range, not a point to substitute
        if sign == Relation::Eq {
            next.verification = Some(self.verify(spec, solution)?);
        }
        Ok((next, StepStatus::Win))
    }
}

impl Environment for EquationEnv {
    fn mode(&self) -> GameMode {
        GameMode::Equation
    }

    fn step(
        &self,
        prior: Option<&WorldState>,
        action: Option<&Action>,
        level: &LevelConfig,
    ) -> Result<StepResult, SimulationFault> {
        let initial;
        let prior = match prior {
            Some(WorldState::Equation(equation)) => equation,
            Some(other) => return Err(self.mismatch(other)),
            None => {
                initial = self.initial(level)?;
                &initial
            }
        };

        match action.map(|a| &a.kind) {
            Some(ActionKind::OpBoth { operator, value }) => {
                let (next, status) = self.apply(prior, *operator, value.trim(), level)?;
                Ok(StepResult {
                    state: WorldState::Equation(next),
                    status,
                })
            }
            _ => Ok(StepResult::running(WorldState::Equation(prior.clone()))),
        }
    }

    fn check_victory(
        &self,
        state: &WorldState,
        level: &LevelConfig,
        _reference: Option<&ReferenceModel>,
    ) -> Result<bool, SimulationFault> {
        let WorldState::Equation(equation) = state else {
            return Err(self.mismatch(state));
        };
        let var = self.spec(level)?.variable.as_str();
        let lhs = self.parse_side(&equation.lhs, var)?;
        let rhs = self.parse_side(&equation.rhs, var)?;
        Ok(solved_value(&lhs, &rhs).is_some())
    }
}
