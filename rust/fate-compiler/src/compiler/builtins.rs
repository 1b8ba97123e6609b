//! Names of the runtime library surface generated code calls into.

use fate_core::Value;

// ── Runtime functions ───────────────────────────────────────────────

pub const IS_TRUE: &str = "isTrue";
pub const IS_FALSE: &str = "isFalse";
pub const IS_IN: &str = "isIn";
pub const IS_MATCH: &str = "isMatch";
pub const IS_OBJECT: &str = "isObject";
pub const IS_ARRAY: &str = "isArray";
pub const CREATE_ITERATOR: &str = "createIterator";
pub const SLICE_ARRAY: &str = "sliceArray";
pub const DEFINE_PATTERN: &str = "definePattern";
pub const DEFINE_REGEX: &str = "defineRegex";
pub const IMPORT_MODULE: &str = "importModule";
pub const CREATE_DO_BLOCK: &str = "createDoBlock";
pub const CREATE_GENERATOR: &str = "createGenerator";
pub const AWAIT_VALUE: &str = "awaitValue";
pub const AWAIT_ANY: &str = "awaitAny";
pub const AWAIT_ALL: &str = "awaitAll";
pub const EMIT_VALUE: &str = "emitValue";

/// Type-pattern names and the runtime predicate each compiles to.
const TYPE_PREDICATES: &[(&str, &str)] = &[
    ("Any", "isAny"),
    ("Array", "isArray"),
    ("Boolean", "isBoolean"),
    ("Function", "isFunction"),
    ("Integer", "isInteger"),
    ("Null", "isNull"),
    ("Number", "isNumber"),
    ("Object", "isObject"),
    ("String", "isString"),
];

pub fn type_predicate(name: &str) -> Option<&'static str> {
    TYPE_PREDICATES.iter().find(|(n, _)| *n == name).map(|(_, p)| *p)
}

/// Evaluate a type predicate natively, for the reference interpreter.
/// `Function` needs runtime knowledge and is answered by the caller.
pub fn check_type(name: &str, value: &Value) -> Option<bool> {
    Some(match name {
        "Any" => !matches!(value, Value::Nothing),
        "Array" => matches!(value, Value::Array(_)),
        "Boolean" => matches!(value, Value::Bool(_)),
        "Integer" => value.is_integer(),
        "Null" => matches!(value, Value::Null),
        "Number" => matches!(value, Value::Number(_)),
        "Object" => matches!(value, Value::Object(_)),
        "String" => matches!(value, Value::String(_)),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_map_to_predicates() {
        assert_eq!(type_predicate("Integer"), Some("isInteger"));
        assert_eq!(type_predicate("integer"), None);
        assert_eq!(check_type("Integer", &Value::from(3)), Some(true));
        assert_eq!(check_type("Integer", &Value::Number(1.5)), Some(false));
        assert_eq!(check_type("Function", &Value::Null), None);
    }
}
