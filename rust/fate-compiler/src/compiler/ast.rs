//! Tagged syntax tree handed over by the external parser.
//!
//! Every node is a [`Node`] wrapping a [`NodeKind`]; the discriminant enum
//! [`Tag`] is derived from `NodeKind` and drives the traversal engine's
//! dispatch tables.

use crate::compiler::span::Span;
use fate_core::{BinaryOp, UnaryOp, Value};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumString, IntoStaticStr};

/// Identity of a node within one tree. Id `0` is reserved for placeholders
/// and nodes that have not been numbered yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: NodeKind,
}

/// Assignment and loop binding targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    Name(String),
    /// `[a, b] = ...`
    Array(Vec<String>),
    /// `{key: name, ...} = ...`
    Object(Vec<(String, String)>),
}

impl Target {
    /// Names bound by this target, in source order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Target::Name(n) => vec![n.as_str()],
            Target::Array(names) => names.iter().map(|n| n.as_str()).collect(),
            Target::Object(pairs) => pairs.iter().map(|(_, n)| n.as_str()).collect(),
        }
    }
}

/// One entry of an `import`/`from`/`export` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleItem {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl ModuleItem {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), alias: None }
    }

    /// Name visible on the other side of the module boundary.
    pub fn visible_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// How an `await` settles a collection of awaitables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Resolver {
    Value,
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(Tag), derive(Hash, PartialOrd, Ord, Display, IntoStaticStr, EnumString))]
#[serde(tag = "tag", rename_all = "camelCase")]
pub enum NodeKind {
    Module { body: Vec<Node> },

    // ── Statements ──
    Let { assignments: Vec<Node> },
    Assignment { target: Target, value: Box<Node> },
    If { condition: Box<Node>, then_body: Vec<Node>, else_body: Vec<Node> },
    For { ranges: Vec<Node>, body: Vec<Node>, else_body: Vec<Node> },
    Range { target: Target, collection: Box<Node>, guard: Option<Box<Node>> },
    Return { value: Box<Node> },
    ExprStatement { expr: Box<Node> },
    Function { name: String, params: Vec<Node>, guard: Option<Box<Node>>, body: Vec<Node> },
    Param { name: String, pattern: Option<Box<Node>>, variadic: bool },
    Import { module: String, alias: String },
    From { module: String, items: Vec<ModuleItem> },
    Export { decl: Option<Box<Node>>, items: Vec<ModuleItem> },

    // ── Expressions ──
    Literal { value: Value },
    Identifier { name: String },
    Context,
    Unary { op: UnaryOp, operand: Box<Node> },
    Binary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    And { left: Box<Node>, right: Box<Node> },
    Or { left: Box<Node>, right: Box<Node> },
    Conditional { condition: Box<Node>, consequent: Box<Node>, alternative: Box<Node> },
    Array { elements: Vec<Node> },
    Object { entries: Vec<Node> },
    Entry { key: Box<Node>, value: Box<Node> },
    Member { object: Box<Node>, property: Box<Node> },
    Call { callee: Box<Node>, args: Vec<Node> },
    Lambda { params: Vec<Node>, body: Box<Node> },
    Reduce { accumulators: Vec<Node>, ranges: Vec<Node>, body: Vec<Node> },
    Match { value: Box<Node>, clauses: Vec<Node>, else_body: Vec<Node> },
    MatchClause { patterns: Vec<Node>, body: Vec<Node> },

    // ── Patterns ──
    Pattern { expr: Box<Node> },
    ObjectPattern { elements: Vec<Node> },
    ArrayPattern { elements: Vec<Node> },
    PatternElement { key: Option<Box<Node>>, value: Box<Node> },
    Regex { pattern: String, flags: String },

    // ── Concurrency ──
    Do { body: Vec<Node> },
    Generate { body: Vec<Node> },
    Await { resolver: Resolver, value: Box<Node> },
    Emit { value: Box<Node> },
}

/// Mutable access to one child slot of a node.
pub enum ChildMut<'a> {
    Node(&'a mut Node),
    /// An expression or declaration list (arguments, elements, params, ...).
    List(&'a mut Vec<Node>),
    /// A statement list; statement-group visitors run over these.
    Body(&'a mut Vec<Node>),
}

/// Tags that own a `scope/declarations` list.
pub const SCOPE_CONTAINERS: &[Tag] = &[
    Tag::Module,
    Tag::Function,
    Tag::Lambda,
    Tag::Reduce,
    Tag::For,
    Tag::Do,
    Tag::Generate,
];

impl Tag {
    pub fn is_scope_container(self) -> bool {
        SCOPE_CONTAINERS.contains(&self)
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { id: NodeId::default(), span: Span::dummy(), kind }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn tag(&self) -> Tag {
        Tag::from(&self.kind)
    }

    pub fn literal(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Literal { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.literal().is_some()
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }

    /// Move the node out, leaving a placeholder literal behind.
    pub fn take(&mut self) -> Node {
        std::mem::replace(self, Node::new(NodeKind::Literal { value: Value::Nothing }))
    }

    pub fn children_mut(&mut self) -> Vec<ChildMut<'_>> {
        use ChildMut as C;
        use NodeKind::*;
        match &mut self.kind {
            Module { body } | Do { body } | Generate { body } => vec![C::Body(body)],
            Let { assignments } => vec![C::List(assignments)],
            Assignment { value, .. } => vec![C::Node(value)],
            If { condition, then_body, else_body } => {
                vec![C::Node(condition), C::Body(then_body), C::Body(else_body)]
            }
            For { ranges, body, else_body } => {
                vec![C::List(ranges), C::Body(body), C::Body(else_body)]
            }
            Range { collection, guard, .. } => {
                let mut slots = vec![C::Node(collection)];
                if let Some(g) = guard {
                    slots.push(C::Node(g));
                }
                slots
            }
            Return { value } | Await { value, .. } | Emit { value } => vec![C::Node(value)],
            ExprStatement { expr } | Pattern { expr } => vec![C::Node(expr)],
            Function { params, guard, body, .. } => {
                let mut slots = vec![C::List(params)];
                if let Some(g) = guard {
                    slots.push(C::Node(g));
                }
                slots.push(C::Body(body));
                slots
            }
            Param { pattern, .. } => pattern.iter_mut().map(|p| C::Node(p)).collect(),
            Export { decl, .. } => decl.iter_mut().map(|d| C::Node(d)).collect(),
            Import { .. } | From { .. } | Literal { .. } | Identifier { .. } | Context
            | Regex { .. } => vec![],
            Unary { operand, .. } => vec![C::Node(operand)],
            Binary { left, right, .. } | And { left, right } | Or { left, right } => {
                vec![C::Node(left), C::Node(right)]
            }
            Conditional { condition, consequent, alternative } => {
                vec![C::Node(condition), C::Node(consequent), C::Node(alternative)]
            }
            Array { elements } | ObjectPattern { elements } | ArrayPattern { elements } => {
                vec![C::List(elements)]
            }
            Object { entries } => vec![C::List(entries)],
            Entry { key, value } => vec![C::Node(key), C::Node(value)],
            Member { object, property } => vec![C::Node(object), C::Node(property)],
            Call { callee, args } => vec![C::Node(callee), C::List(args)],
            Lambda { params, body } => vec![C::List(params), C::Node(body)],
            Reduce { accumulators, ranges, body } => {
                vec![C::List(accumulators), C::List(ranges), C::Body(body)]
            }
            Match { value, clauses, else_body } => {
                vec![C::Node(value), C::List(clauses), C::Body(else_body)]
            }
            MatchClause { patterns, body } => vec![C::List(patterns), C::Body(body)],
            PatternElement { key, value } => {
                let mut slots: Vec<ChildMut<'_>> = key.iter_mut().map(|k| C::Node(k)).collect();
                slots.push(C::Node(value));
                slots
            }
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Node> {
        use NodeKind::*;
        fn opt(n: &Option<Box<Node>>) -> impl Iterator<Item = &Node> {
            n.iter().map(|b| b.as_ref())
        }
        match &self.kind {
            Module { body } | Do { body } | Generate { body } => body.iter().collect(),
            Let { assignments } => assignments.iter().collect(),
            Assignment { value, .. } => vec![value],
            If { condition, then_body, else_body } => std::iter::once(condition.as_ref())
                .chain(then_body)
                .chain(else_body)
                .collect(),
            For { ranges, body, else_body } => ranges.iter().chain(body).chain(else_body).collect(),
            Range { collection, guard, .. } => {
                std::iter::once(collection.as_ref()).chain(opt(guard)).collect()
            }
            Return { value } | Await { value, .. } | Emit { value } => vec![value],
            ExprStatement { expr } | Pattern { expr } => vec![expr],
            Function { params, guard, body, .. } => {
                params.iter().chain(opt(guard)).chain(body).collect()
            }
            Param { pattern, .. } => opt(pattern).collect(),
            Export { decl, .. } => opt(decl).collect(),
            Import { .. } | From { .. } | Literal { .. } | Identifier { .. } | Context
            | Regex { .. } => vec![],
            Unary { operand, .. } => vec![operand],
            Binary { left, right, .. } | And { left, right } | Or { left, right } => {
                vec![left, right]
            }
            Conditional { condition, consequent, alternative } => {
                vec![condition, consequent, alternative]
            }
            Array { elements } | ObjectPattern { elements } | ArrayPattern { elements } => {
                elements.iter().collect()
            }
            Object { entries } => entries.iter().collect(),
            Entry { key, value } => vec![key, value],
            Member { object, property } => vec![object, property],
            Call { callee, args } => std::iter::once(callee.as_ref()).chain(args).collect(),
            Lambda { params, body } => params.iter().chain(std::iter::once(body.as_ref())).collect(),
            Reduce { accumulators, ranges, body } => {
                accumulators.iter().chain(ranges).chain(body).collect()
            }
            Match { value, clauses, else_body } => std::iter::once(value.as_ref())
                .chain(clauses)
                .chain(else_body)
                .collect(),
            MatchClause { patterns, body } => patterns.iter().chain(body).collect(),
            PatternElement { key, value } => opt(key).chain(std::iter::once(value.as_ref())).collect(),
        }
    }

    /// Pre-order visit of this node and all of its descendants.
    pub fn visit(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Whether any node in this subtree satisfies `pred`.
    pub fn any(&self, pred: &impl Fn(&Node) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }

    fn renumber(&mut self, next: &mut u32) {
        *next += 1;
        self.id = NodeId(*next);
        for slot in self.children_mut() {
            match slot {
                ChildMut::Node(n) => n.renumber(next),
                ChildMut::List(list) | ChildMut::Body(list) => {
                    for n in list.iter_mut() {
                        n.renumber(next);
                    }
                }
            }
        }
    }
}

/// One compilation unit: a `module` root with uniquely numbered nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub root: Node,
    next_id: u32,
}

impl Tree {
    /// Wrap top-level statements in a module root.
    pub fn new(body: Vec<Node>) -> Self {
        Self::from_root(Node::new(NodeKind::Module { body }))
    }

    /// Adopt an existing root. A non-module root is wrapped as the single
    /// statement of a module.
    pub fn from_root(root: Node) -> Self {
        let mut root = match root.kind {
            NodeKind::Module { .. } => root,
            _ => Node::new(NodeKind::Module { body: vec![root] }),
        };
        let mut next_id = 0;
        root.renumber(&mut next_id);
        Self { root, next_id }
    }

    /// Load a tree serialized by the external parser.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let root: Node = serde_json::from_str(json)?;
        Ok(Self::from_root(root))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.root)
    }

    pub fn body(&self) -> &[Node] {
        match &self.root.kind {
            NodeKind::Module { body } => body,
            _ => &[],
        }
    }

    /// First id not used by any node of this tree.
    pub fn next_id(&self) -> u32 {
        self.next_id + 1
    }

    pub(crate) fn into_parts(self) -> (Node, u32) {
        let next = self.next_id();
        (self.root, next)
    }

    pub(crate) fn from_parts(root: Node, next_id: u32) -> Self {
        Self { root, next_id: next_id.saturating_sub(1) }
    }
}
