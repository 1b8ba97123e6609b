//! Operator catalogue and the host semantics used to fold them.
//!
//! Every `apply_*` function returns `None` when the host result is not
//! defined over the operand types; callers leave such expressions alone.

use crate::values::Value;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
}

impl BinaryOp {
    /// Ordering and equality comparisons.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte
        )
    }

    /// Operators that relate a match value to something else rather than
    /// producing a template to compare against.
    pub fn is_relational(self) -> bool {
        self.is_comparison() || matches!(self, BinaryOp::In | BinaryOp::NotIn | BinaryOp::Like)
    }

    /// The comparison whose result is the negation of this one.
    pub fn inverse(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Neq),
            BinaryOp::Neq => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Gte),
            BinaryOp::Gte => Some(BinaryOp::Lt),
            BinaryOp::Gt => Some(BinaryOp::Lte),
            BinaryOp::Lte => Some(BinaryOp::Gt),
            _ => None,
        }
    }

    /// Infix JavaScript operator, for operators that map onto one directly.
    pub fn js_operator(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("+"),
            BinaryOp::Sub => Some("-"),
            BinaryOp::Mul => Some("*"),
            BinaryOp::Div => Some("/"),
            BinaryOp::Mod => Some("%"),
            BinaryOp::Eq => Some("==="),
            BinaryOp::Neq => Some("!=="),
            BinaryOp::Lt => Some("<"),
            BinaryOp::Lte => Some("<="),
            BinaryOp::Gt => Some(">"),
            BinaryOp::Gte => Some(">="),
            BinaryOp::In | BinaryOp::NotIn | BinaryOp::Like => None,
        }
    }
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Option<Value> {
    match op {
        UnaryOp::Not => Some(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => operand.as_number().map(|n| Value::Number(-n)),
    }
}

pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    use Value::{Bool, Number};
    match op {
        BinaryOp::Add => match (left, right) {
            (Number(a), Number(b)) => Some(Number(a + b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                let l = left.to_host_string()?;
                let r = right.to_host_string()?;
                Some(Value::String(l + &r))
            }
            _ => None,
        },
        BinaryOp::Sub => numeric(left, right, |a, b| a - b),
        BinaryOp::Mul => numeric(left, right, |a, b| a * b),
        BinaryOp::Div => numeric(left, right, |a, b| a / b),
        BinaryOp::Mod => numeric(left, right, |a, b| a % b),
        BinaryOp::Eq => strict_equals(left, right).map(Bool),
        BinaryOp::Neq => strict_equals(left, right).map(|eq| Bool(!eq)),
        BinaryOp::Lt => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Lte => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Gte => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::In => contains(right, left).map(Bool),
        BinaryOp::NotIn => contains(right, left).map(|found| Bool(!found)),
        BinaryOp::Like => None,
    }
}

/// Strict (pre-coercion) equality, defined only on primitives.
pub fn strict_equals(left: &Value, right: &Value) -> Option<bool> {
    if !left.is_primitive() || !right.is_primitive() {
        return None;
    }
    Some(match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (a, b) => a == b,
    })
}

fn numeric(left: &Value, right: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Some(Value::Number(f(*a, *b))),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value, f: impl Fn(std::cmp::Ordering) -> bool) -> Option<Value> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => match a.partial_cmp(b) {
            Some(o) => o,
            // NaN compares false against everything.
            None => return Some(Value::Bool(false)),
        },
        // Strings order by UTF-16 code unit.
        (Value::String(a), Value::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
        _ => return None,
    };
    Some(Value::Bool(f(ordering)))
}

fn contains(collection: &Value, item: &Value) -> Option<bool> {
    match collection {
        Value::Array(items) => {
            if !item.is_primitive() {
                return None;
            }
            Some(items.iter().any(|v| strict_equals(v, item) == Some(true)))
        }
        Value::Object(entries) => {
            let key = item.as_str()?;
            Some(entries.iter().any(|(k, _)| k == key))
        }
        Value::String(s) => Some(s.contains(item.as_str()?)),
        _ => None,
    }
}
