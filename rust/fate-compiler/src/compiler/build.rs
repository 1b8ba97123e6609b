//! Constructors for hand-built trees.
//!
//! The parser lives outside this crate, so tests and embedders assemble
//! trees from these helpers. Ids are assigned when the nodes are wrapped in
//! a [`Tree`](crate::compiler::ast::Tree).

use crate::compiler::ast::{ModuleItem, Node, NodeKind, Resolver, Target};
use fate_core::{BinaryOp, UnaryOp, Value};

fn node(kind: NodeKind) -> Node {
    Node::new(kind)
}

fn boxed(n: Node) -> Box<Node> {
    Box::new(n)
}

// ── Literals and references ─────────────────────────────────────────

pub fn lit(value: impl Into<Value>) -> Node {
    node(NodeKind::Literal { value: value.into() })
}

pub fn num(n: f64) -> Node {
    lit(n)
}

pub fn str_(s: &str) -> Node {
    lit(s)
}

pub fn bool_(b: bool) -> Node {
    lit(b)
}

pub fn null() -> Node {
    lit(Value::Null)
}

pub fn nothing() -> Node {
    lit(Value::Nothing)
}

pub fn ident(name: &str) -> Node {
    node(NodeKind::Identifier { name: name.to_string() })
}

pub fn context() -> Node {
    node(NodeKind::Context)
}

pub fn regex(pattern: &str, flags: &str) -> Node {
    node(NodeKind::Regex { pattern: pattern.to_string(), flags: flags.to_string() })
}

// ── Operators ───────────────────────────────────────────────────────

pub fn unary(op: UnaryOp, operand: Node) -> Node {
    node(NodeKind::Unary { op, operand: boxed(operand) })
}

pub fn not(operand: Node) -> Node {
    unary(UnaryOp::Not, operand)
}

pub fn neg(operand: Node) -> Node {
    unary(UnaryOp::Neg, operand)
}

pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
    node(NodeKind::Binary { op, left: boxed(left), right: boxed(right) })
}

pub fn and(left: Node, right: Node) -> Node {
    node(NodeKind::And { left: boxed(left), right: boxed(right) })
}

pub fn or(left: Node, right: Node) -> Node {
    node(NodeKind::Or { left: boxed(left), right: boxed(right) })
}

pub fn cond(condition: Node, consequent: Node, alternative: Node) -> Node {
    node(NodeKind::Conditional {
        condition: boxed(condition),
        consequent: boxed(consequent),
        alternative: boxed(alternative),
    })
}

// ── Collections and calls ───────────────────────────────────────────

pub fn array(elements: Vec<Node>) -> Node {
    node(NodeKind::Array { elements })
}

pub fn object(entries: Vec<(&str, Node)>) -> Node {
    let entries = entries
        .into_iter()
        .map(|(k, v)| node(NodeKind::Entry { key: boxed(str_(k)), value: boxed(v) }))
        .collect();
    node(NodeKind::Object { entries })
}

pub fn member(object: Node, property: Node) -> Node {
    node(NodeKind::Member { object: boxed(object), property: boxed(property) })
}

pub fn call(callee: Node, args: Vec<Node>) -> Node {
    node(NodeKind::Call { callee: boxed(callee), args })
}

pub fn lambda(params: Vec<Node>, body: Node) -> Node {
    node(NodeKind::Lambda { params, body: boxed(body) })
}

// ── Statements ──────────────────────────────────────────────────────

pub fn assign(name: &str, value: Node) -> Node {
    assign_to(Target::Name(name.to_string()), value)
}

pub fn assign_to(target: Target, value: Node) -> Node {
    node(NodeKind::Assignment { target, value: boxed(value) })
}

/// `let name = value` with a single assignment.
pub fn let_(name: &str, value: Node) -> Node {
    let_many(vec![assign(name, value)])
}

pub fn let_many(assignments: Vec<Node>) -> Node {
    node(NodeKind::Let { assignments })
}

pub fn if_(condition: Node, then_body: Vec<Node>, else_body: Vec<Node>) -> Node {
    node(NodeKind::If { condition: boxed(condition), then_body, else_body })
}

pub fn for_(ranges: Vec<Node>, body: Vec<Node>, else_body: Vec<Node>) -> Node {
    node(NodeKind::For { ranges, body, else_body })
}

pub fn range(name: &str, collection: Node) -> Node {
    range_to(Target::Name(name.to_string()), collection, None)
}

pub fn guarded_range(name: &str, collection: Node, guard: Node) -> Node {
    range_to(Target::Name(name.to_string()), collection, Some(guard))
}

pub fn range_to(target: Target, collection: Node, guard: Option<Node>) -> Node {
    node(NodeKind::Range { target, collection: boxed(collection), guard: guard.map(boxed) })
}

pub fn ret(value: Node) -> Node {
    node(NodeKind::Return { value: boxed(value) })
}

pub fn expr_stmt(expr: Node) -> Node {
    node(NodeKind::ExprStatement { expr: boxed(expr) })
}

pub fn func(name: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    guarded_func(name, params, None, body)
}

pub fn guarded_func(name: &str, params: Vec<Node>, guard: Option<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::Function { name: name.to_string(), params, guard: guard.map(boxed), body })
}

pub fn param(name: &str) -> Node {
    node(NodeKind::Param { name: name.to_string(), pattern: None, variadic: false })
}

/// A parameter constrained by a pattern, e.g. `a: Integer`.
pub fn typed_param(name: &str, pattern: Node) -> Node {
    node(NodeKind::Param { name: name.to_string(), pattern: Some(boxed(pattern)), variadic: false })
}

pub fn variadic(name: &str) -> Node {
    node(NodeKind::Param { name: name.to_string(), pattern: None, variadic: true })
}

pub fn reduce(accumulators: Vec<Node>, ranges: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::Reduce { accumulators, ranges, body })
}

// ── Patterns and matching ───────────────────────────────────────────

pub fn pattern(expr: Node) -> Node {
    node(NodeKind::Pattern { expr: boxed(expr) })
}

pub fn object_pattern(elements: Vec<(&str, Node)>) -> Node {
    let elements = elements.into_iter().map(|(k, v)| element(Some(str_(k)), v)).collect();
    node(NodeKind::ObjectPattern { elements })
}

pub fn array_pattern(elements: Vec<Node>) -> Node {
    let elements = elements.into_iter().map(|v| element(None, v)).collect();
    node(NodeKind::ArrayPattern { elements })
}

pub fn element(key: Option<Node>, value: Node) -> Node {
    node(NodeKind::PatternElement { key: key.map(boxed), value: boxed(value) })
}

pub fn match_(value: Node, clauses: Vec<Node>, else_body: Vec<Node>) -> Node {
    node(NodeKind::Match { value: boxed(value), clauses, else_body })
}

pub fn clause(patterns: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::MatchClause { patterns, body })
}

// ── Concurrency ─────────────────────────────────────────────────────

pub fn do_(body: Vec<Node>) -> Node {
    node(NodeKind::Do { body })
}

pub fn generate(body: Vec<Node>) -> Node {
    node(NodeKind::Generate { body })
}

pub fn await_(resolver: Resolver, value: Node) -> Node {
    node(NodeKind::Await { resolver, value: boxed(value) })
}

pub fn emit(value: Node) -> Node {
    node(NodeKind::Emit { value: boxed(value) })
}

// ── Modules ─────────────────────────────────────────────────────────

pub fn import_(module: &str, alias: &str) -> Node {
    node(NodeKind::Import { module: module.to_string(), alias: alias.to_string() })
}

pub fn from_(module: &str, items: Vec<ModuleItem>) -> Node {
    node(NodeKind::From { module: module.to_string(), items })
}

pub fn item(name: &str) -> ModuleItem {
    ModuleItem::new(name)
}

pub fn item_as(name: &str, alias: &str) -> ModuleItem {
    ModuleItem { name: name.to_string(), alias: Some(alias.to_string()) }
}

pub fn export_items(items: Vec<ModuleItem>) -> Node {
    node(NodeKind::Export { decl: None, items })
}

/// `export` wrapping an inline declaration (`export fn ...`, `export let ...`).
pub fn export_decl(decl: Node) -> Node {
    node(NodeKind::Export { decl: Some(boxed(decl)), items: vec![] })
}
