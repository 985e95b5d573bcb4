//! Evaluator for `validate` expressions over a role assignment.
//!
//! Field values arrive as strings; comparison and equality coerce both
//! sides to numbers when both parse, and fall back to string comparison
//! otherwise. Arithmetic requires numbers, boolean connectives require
//! booleans, and the top-level result must be a boolean. There is no
//! truthiness: a non-boolean result is an evaluation failure, not a
//! silently-converted verdict.

use cfgcheck_rules::{BinaryOp, Expr, UnaryOp};

use crate::assignment::RoleAssignment;
use crate::error::EvalFailure;

/// An intermediate expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }

    /// Numeric view: numbers directly, strings when they parse as f64.
    fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Canonical string form used when numeric coercion does not apply.
    fn as_comparison_str(&self) -> String {
        match self {
            Value::Num(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
        }
    }
}

/// Evaluate an expression to a boolean verdict.
///
/// Any failure (unknown role, absent field, type mismatch, division by
/// zero, non-boolean result) is returned as an [`EvalFailure`] for the
/// caller to report as an `evaluation_error` violation.
pub fn evaluate(expr: &Expr, assignment: &RoleAssignment<'_>) -> Result<bool, EvalFailure> {
    match eval(expr, assignment)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalFailure::NonBoolean(other.type_name().to_string())),
    }
}

fn eval(expr: &Expr, assignment: &RoleAssignment<'_>) -> Result<Value, EvalFailure> {
    match expr {
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Path { role, field } => {
            let group = assignment
                .get(role)
                .ok_or_else(|| EvalFailure::UnknownRole(role.clone()))?;
            let value = group
                .get(field)
                .ok_or_else(|| EvalFailure::UnresolvedField {
                    role: role.clone(),
                    field: field.clone(),
                })?;
            Ok(Value::Str(value.to_string()))
        }
        Expr::Unary { op, expr } => {
            let v = eval(expr, assignment)?;
            match op {
                UnaryOp::Not => v
                    .as_bool()
                    .map(|b| Value::Bool(!b))
                    .ok_or_else(|| type_mismatch("not", &v, &v)),
                UnaryOp::Neg => v
                    .as_num()
                    .map(|n| Value::Num(-n))
                    .ok_or_else(|| type_mismatch("-", &v, &v)),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, assignment)?;
            let r = eval(rhs, assignment)?;
            apply_binary(*op, l, r)
        }
    }
}

fn apply_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalFailure> {
    match op {
        BinaryOp::Or | BinaryOp::And => {
            let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) else {
                return Err(type_mismatch(op.symbol(), &l, &r));
            };
            Ok(Value::Bool(if op == BinaryOp::Or { a || b } else { a && b }))
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            // Numeric equality when both sides coerce, string equality
            // otherwise. "2" == 2.0 holds; "abc" == "abc" holds.
            let equal = match (l.as_num(), r.as_num()) {
                (Some(a), Some(b)) => a == b,
                _ => l.as_comparison_str() == r.as_comparison_str(),
            };
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (l.as_num(), r.as_num()) {
                (Some(a), Some(b)) => a
                    .partial_cmp(&b)
                    .ok_or_else(|| EvalFailure::TypeMismatch("NaN comparison".into()))?,
                _ => match (&l, &r) {
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => return Err(type_mismatch(op.symbol(), &l, &r)),
                },
            };
            let pass = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(pass))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (Some(a), Some(b)) = (l.as_num(), r.as_num()) else {
                return Err(type_mismatch(op.symbol(), &l, &r));
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(EvalFailure::DivisionByZero);
                    }
                    a / b
                }
                _ => unreachable!(),
            };
            Ok(Value::Num(result))
        }
    }
}

fn type_mismatch(op: &str, l: &Value, r: &Value) -> EvalFailure {
    EvalFailure::TypeMismatch(format!(
        "operator '{op}' cannot combine {} and {}",
        l.type_name(),
        r.type_name()
    ))
}
