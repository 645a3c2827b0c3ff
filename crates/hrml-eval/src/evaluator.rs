//! Expression evaluator.

use std::cmp::Ordering;

use hrml_types::ast::{BinOp, Expr, ExprKind, UnaryOp};
use hrml_types::Value;

use crate::builtins::call_builtin;
use crate::env::Environment;
use crate::error::{EvalError, EvalResult};

/// Evaluate `expr` against `env`.
pub fn evaluate(expr: &Expr, env: &Environment) -> EvalResult<Value> {
    Evaluator::new(env).eval_expr(expr)
}

/// Walks expression nodes and produces [`Value`]s.
///
/// Evaluation never mutates the environment; bindings are made by the
/// renderer around the nodes that introduce them.
pub struct Evaluator<'env> {
    env: &'env Environment,
}

impl<'env> Evaluator<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Self { env }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expression evaluation
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression to a Value.
    pub fn eval_expr(&self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::List(items) => items
                .iter()
                .map(|item| self.eval_expr(item))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),
            ExprKind::Path(path) => Ok(self.env.lookup(path).cloned().unwrap_or_default()),
            ExprKind::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval_expr(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                call_builtin(name, args)
            }
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right),
        }
    }

    /// Evaluate an expression for its truthiness.
    pub fn eval_condition(&self, expr: &Expr) -> EvalResult<bool> {
        self.eval_expr(expr).map(|v| v.is_truthy())
    }

    // ── Operators ────────────────────────────────────────────────────────

    fn eval_unary(&self, op: UnaryOp, operand: &Expr) -> EvalResult<Value> {
        let value = self.eval_expr(operand)?;
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(EvalError::TypeMismatch(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn eval_binary(&self, left: &Expr, op: BinOp, right: &Expr) -> EvalResult<Value> {
        // Short-circuit for logical operators
        if op == BinOp::And {
            let lv = self.eval_expr(left)?;
            return if !lv.is_truthy() {
                Ok(Value::Bool(false))
            } else {
                Ok(Value::Bool(self.eval_expr(right)?.is_truthy()))
            };
        }
        if op == BinOp::Or {
            let lv = self.eval_expr(left)?;
            return if lv.is_truthy() {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(self.eval_expr(right)?.is_truthy()))
            };
        }

        let lv = self.eval_expr(left)?;
        let rv = self.eval_expr(right)?;

        match op {
            BinOp::Add => eval_add(&lv, &rv),
            BinOp::Sub => eval_arith(&lv, &rv, op, |a, b| a - b),
            BinOp::Mul => eval_arith(&lv, &rv, op, |a, b| a * b),
            BinOp::Div | BinOp::Mod => {
                if matches!(rv, Value::Number(b) if b == 0.0) && matches!(lv, Value::Number(_)) {
                    return Err(EvalError::DivisionByZero);
                }
                if op == BinOp::Div {
                    eval_arith(&lv, &rv, op, |a, b| a / b)
                } else {
                    eval_arith(&lv, &rv, op, |a, b| a % b)
                }
            }
            BinOp::Eq => Ok(Value::Bool(lv == rv)),
            BinOp::NotEq => Ok(Value::Bool(lv != rv)),
            BinOp::Less => eval_comparison(&lv, &rv, op, Ordering::is_lt),
            BinOp::Greater => eval_comparison(&lv, &rv, op, Ordering::is_gt),
            BinOp::LessEq => eval_comparison(&lv, &rv, op, Ordering::is_le),
            BinOp::GreaterEq => eval_comparison(&lv, &rv, op, Ordering::is_ge),
            BinOp::In => contains(&rv, &lv).map(Value::Bool),
            BinOp::NotIn => contains(&rv, &lv).map(|found| Value::Bool(!found)),
            // handled above
            BinOp::And | BinOp::Or => Ok(Value::Null),
        }
    }
}

fn eval_add(lv: &Value, rv: &Value) -> EvalResult<Value> {
    match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        _ => match (lv.as_str(), rv.as_str()) {
            (Some(a), Some(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot add {} and {}",
                lv.type_name(),
                rv.type_name()
            ))),
        },
    }
}

fn eval_arith(lv: &Value, rv: &Value, op: BinOp, f: fn(f64, f64) -> f64) -> EvalResult<Value> {
    if let (Value::Number(a), Value::Number(b)) = (lv, rv) {
        Ok(Value::Number(f(*a, *b)))
    } else {
        Err(EvalError::TypeMismatch(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            lv.type_name(),
            rv.type_name()
        )))
    }
}

/// Relational comparison: both numbers, or both strings (lexicographic).
fn eval_comparison(
    lv: &Value,
    rv: &Value,
    op: BinOp,
    test: fn(Ordering) -> bool,
) -> EvalResult<Value> {
    let ordering = match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        _ => match (lv.as_str(), rv.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => {
                return Err(EvalError::TypeMismatch(format!(
                    "cannot compare {} and {} with '{}'",
                    lv.type_name(),
                    rv.type_name(),
                    op.symbol()
                )));
            }
        },
    };
    // NaN compares false with everything
    Ok(Value::Bool(ordering.is_some_and(test)))
}

/// Membership test for `needle in haystack`.
fn contains(haystack: &Value, needle: &Value) -> EvalResult<bool> {
    match haystack {
        Value::Null => Ok(false),
        Value::List(items) => Ok(items.iter().any(|item| item == needle)),
        Value::String(s) | Value::Safe(s) => match needle.as_str() {
            Some(part) => Ok(s.contains(part)),
            None => Err(EvalError::TypeMismatch(format!(
                "cannot search for {} in a string",
                needle.type_name()
            ))),
        },
        Value::Map(fields) => match needle.as_str() {
            Some(key) => Ok(fields.contains_key(key)),
            None => Err(EvalError::TypeMismatch(format!(
                "map keys are strings, got {}",
                needle.type_name()
            ))),
        },
        other => Err(EvalError::TypeMismatch(format!(
            "cannot test membership in {}",
            other.type_name()
        ))),
    }
}
