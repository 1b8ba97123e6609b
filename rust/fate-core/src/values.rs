//! Literal values shared by the compiler and the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Fate value that can appear as a literal in a tree or settle a
/// continuation at runtime.
///
/// `Nothing` is the host's `undefined` and doubles as the language's
/// "nothing" sentinel. Objects keep their entries in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nothing,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// The language's truthiness rule: `false`, `null`, `nothing` and `0` are
    /// false, everything else (including empty collections, the empty string
    /// and `NaN`) is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nothing | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(_) | Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Primitive values compare by value under the host's strict equality.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nothing => "nothing",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_finite() && n.fract() == 0.0)
    }

    /// Look up an object entry by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render the value as a JavaScript expression.
    pub fn to_js(&self) -> String {
        match self {
            Value::Nothing => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_js(*n),
            Value::String(s) => quote(s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_js()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(entries) => {
                if entries.is_empty() {
                    return "{}".to_string();
                }
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.to_js()))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }

    /// The host's `String(value)` conversion for primitives.
    pub fn to_host_string(&self) -> Option<String> {
        match self {
            Value::Nothing => Some("undefined".to_string()),
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Format a number the way the host's `String(n)` prints it: shortest
/// round-trip digits, exponent form outside `1e-6 <= |n| < 1e21`.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Both zeros print as "0".
        return "0".to_string();
    }
    let mut buffer = ryu_js::Buffer::new();
    buffer.format(n).to_string()
}

fn number_to_js(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n < 0.0 || (n == 0.0 && n.is_sign_negative()) {
        if n == 0.0 {
            "(-0)".to_string()
        } else {
            format!("(-{})", format_number(-n))
        }
    } else {
        format_number(n)
    }
}

/// Quote a string as a JavaScript string literal.
pub fn quote(s: &str) -> String {
    // JSON string syntax is a subset of JavaScript's.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.escape_default()))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            other => match other.to_host_string() {
                Some(s) => write!(f, "{}", s),
                None => Ok(()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_language_rule() {
        assert!(!Value::Nothing.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::Object(vec![]).is_truthy());
    }

    #[test]
    fn numbers_format_like_host() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn large_and_small_numbers_use_shortest_digits() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(123456789012345680000.0), "123456789012345680000");
        assert_eq!(format_number(2f64.powi(53) + 2.0), "9007199254740994");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-2.5e25), "-2.5e+25");
    }

    #[test]
    fn exponent_literals_stay_valid_javascript() {
        assert_eq!(Value::Number(1e21).to_js(), "1e+21");
        assert_eq!(Value::Number(-1e-7).to_js(), "(-1e-7)");
    }

    #[test]
    fn js_rendering() {
        assert_eq!(Value::Number(-2.0).to_js(), "(-2)");
        assert_eq!(Value::from("a\"b").to_js(), "\"a\\\"b\"");
        assert_eq!(
            Value::Array(vec![Value::from(1), Value::Nothing]).to_js(),
            "[1, undefined]"
        );
        assert_eq!(
            Value::Object(vec![("k".into(), Value::Bool(true))]).to_js(),
            "{ \"k\": true }"
        );
    }
}
