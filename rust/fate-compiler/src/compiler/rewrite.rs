//! Rewrite pass: constant folding, short-circuiting, and structural
//! simplification.
//!
//! Every handler runs post-order, so operands are already folded when an
//! operator is visited. A folded node keeps the id and span of the
//! expression it replaces, which keeps pattern annotations attached.

use crate::compiler::ast::{ModuleItem, Node, NodeId, NodeKind, Tag};
use crate::compiler::pipeline::Session;
use crate::compiler::span::Span;
use crate::compiler::traverse::{
    self, by_tag, statements, GroupHandler, Handler, Path, Predicate, Walker,
};
use fate_core::ops;
use fate_core::{UnaryOp, Value};

type W<'a> = Walker<'a, ()>;

pub fn run(root: Node, session: &mut Session) -> Result<Node, String> {
    let table: [(Tag, Handler<()>); 10] = [
        (Tag::Unary, fold_unary),
        (Tag::Binary, fold_binary),
        (Tag::And, fold_and),
        (Tag::Or, fold_or),
        (Tag::Conditional, fold_conditional),
        (Tag::If, flip_negated_if),
        (Tag::Array, roll_up_array),
        (Tag::Object, roll_up_object),
        (Tag::For, fuse_loops),
        (Tag::Function, return_sole_reduce),
    ];
    let visitors = vec![
        by_tag(table),
        statements(fold_literal_ifs as GroupHandler<()>, Predicate::Custom(is_literal_if)),
        statements(split_exports as GroupHandler<()>, Predicate::Custom(is_export_decl)),
    ];
    let out = traverse::run(root, &visitors, session, ());
    match out.aborted {
        Some(message) => Err(message),
        None => Ok(out.root),
    }
}

fn literal(id: NodeId, span: Span, value: Value) -> Node {
    Node { id, span, kind: NodeKind::Literal { value } }
}

fn is_not(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Unary { op: UnaryOp::Not, .. })
}

fn strip_not(node: Node) -> Node {
    match node.kind {
        NodeKind::Unary { op: UnaryOp::Not, operand } => *operand,
        kind => Node { kind, ..node },
    }
}

// ── Operators ───────────────────────────────────────────────────────

fn fold_unary(_: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    let Node { id, span, kind } = node;
    let NodeKind::Unary { op, operand } = kind else {
        return Node { id, span, kind };
    };
    if let Some(value) = operand.literal().and_then(|v| ops::apply_unary(op, v)) {
        tracing::trace!(%op, "folded unary");
        return literal(id, span, value);
    }
    let Node { id: inner_id, span: inner_span, kind: inner } = *operand;
    match (op, inner) {
        (UnaryOp::Not, NodeKind::Binary { op: cmp, left, right }) if cmp.inverse().is_some() => {
            let inverse = cmp.inverse().unwrap_or(cmp);
            tracing::trace!(from = %cmp, to = %inverse, "inverted negated comparison");
            Node { id, span, kind: NodeKind::Binary { op: inverse, left, right } }
        }
        (op, inner) => {
            let operand = Box::new(Node { id: inner_id, span: inner_span, kind: inner });
            Node { id, span, kind: NodeKind::Unary { op, operand } }
        }
    }
}

fn fold_binary(_: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::Binary { op, left, right } = &node.kind {
        if let (Some(l), Some(r)) = (left.literal(), right.literal()) {
            if let Some(value) = ops::apply_binary(*op, l, r) {
                tracing::trace!(%op, "folded binary");
                return literal(node.id, node.span, value);
            }
        }
    }
    node
}

fn fold_and(w: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    let Node { id, span, kind } = node;
    let NodeKind::And { left, right } = kind else {
        return Node { id, span, kind };
    };
    if let Some(value) = left.literal() {
        tracing::trace!("short-circuited and");
        return if value.is_truthy() { *right } else { *left };
    }
    if is_not(&left) && is_not(&right) {
        let or = NodeKind::Or { left: Box::new(strip_not(*left)), right: Box::new(strip_not(*right)) };
        return de_morgan(w.session, id, span, or);
    }
    Node { id, span, kind: NodeKind::And { left, right } }
}

fn fold_or(w: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    let Node { id, span, kind } = node;
    let NodeKind::Or { left, right } = kind else {
        return Node { id, span, kind };
    };
    if let Some(value) = left.literal() {
        tracing::trace!("short-circuited or");
        return if value.is_truthy() { *left } else { *right };
    }
    if is_not(&left) && is_not(&right) {
        let and = NodeKind::And { left: Box::new(strip_not(*left)), right: Box::new(strip_not(*right)) };
        return de_morgan(w.session, id, span, and);
    }
    Node { id, span, kind: NodeKind::Or { left, right } }
}

fn de_morgan(session: &mut Session, id: NodeId, span: Span, inner: NodeKind) -> Node {
    tracing::trace!("promoted negated operands");
    let inner = session.number(Node::new(inner).with_span(span));
    Node { id, span, kind: NodeKind::Unary { op: UnaryOp::Not, operand: Box::new(inner) } }
}

fn fold_conditional(_: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    let Node { id, span, kind } = node;
    let NodeKind::Conditional { mut condition, mut consequent, mut alternative } = kind else {
        return Node { id, span, kind };
    };
    while is_not(&condition) {
        condition = Box::new(strip_not(*condition));
        std::mem::swap(&mut consequent, &mut alternative);
    }
    if let Some(value) = condition.literal() {
        tracing::trace!("folded literal conditional");
        return if value.is_truthy() { *consequent } else { *alternative };
    }
    Node { id, span, kind: NodeKind::Conditional { condition, consequent, alternative } }
}

// ── Collections ─────────────────────────────────────────────────────

fn roll_up_array(_: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::Array { elements } = &node.kind {
        let values: Option<Vec<Value>> = elements.iter().map(|e| e.literal().cloned()).collect();
        if let Some(values) = values {
            tracing::trace!(len = values.len(), "rolled up array literal");
            return literal(node.id, node.span, Value::Array(values));
        }
    }
    node
}

fn roll_up_object(_: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::Object { entries } = &node.kind {
        let pairs: Option<Vec<(String, Value)>> = entries
            .iter()
            .map(|entry| match &entry.kind {
                NodeKind::Entry { key, value } => {
                    let key = key.literal()?.as_str()?.to_string();
                    Some((key, value.literal()?.clone()))
                }
                _ => None,
            })
            .collect();
        if let Some(pairs) = pairs {
            tracing::trace!(len = pairs.len(), "rolled up object literal");
            return literal(node.id, node.span, Value::Object(pairs));
        }
    }
    node
}

// ── Statements ──────────────────────────────────────────────────────

fn flip_negated_if(_: &mut W<'_>, mut node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::If { condition, then_body, else_body } = &mut node.kind {
        while is_not(condition) {
            let stripped = strip_not(condition.take());
            **condition = stripped;
            std::mem::swap(then_body, else_body);
        }
    }
    node
}

fn is_literal_if(node: &Node, _: &Path<'_>) -> bool {
    matches!(&node.kind, NodeKind::If { condition, .. } if condition.is_literal())
}

fn fold_literal_ifs(_: &mut W<'_>, run: Vec<Node>, _: &Path<'_>) -> Vec<Node> {
    let mut out = Vec::new();
    for stmt in run {
        match stmt.kind {
            NodeKind::If { condition, then_body, else_body } => {
                let taken = condition.literal().is_some_and(Value::is_truthy);
                tracing::trace!(taken, "folded literal if");
                out.extend(if taken { then_body } else { else_body });
            }
            kind => out.push(Node { kind, ..stmt }),
        }
    }
    out
}

fn fuse_loops(_: &mut W<'_>, mut node: Node, _: &Path<'_>) -> Node {
    let NodeKind::For { ranges, body, else_body } = &mut node.kind else {
        return node;
    };
    let fusable = else_body.is_empty()
        && body.len() == 1
        && matches!(&body[0].kind, NodeKind::For { else_body: inner_else, .. } if inner_else.is_empty());
    if !fusable {
        return node;
    }
    let inner = body.remove(0);
    if let NodeKind::For { ranges: inner_ranges, body: inner_body, .. } = inner.kind {
        tracing::trace!(
            outer = ranges.len(),
            inner = inner_ranges.len(),
            "fused nested for loops"
        );
        ranges.extend(inner_ranges);
        *body = inner_body;
    }
    node
}

fn return_sole_reduce(_: &mut W<'_>, mut node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::Function { body, .. } = &mut node.kind {
        if let [stmt] = body.as_mut_slice() {
            if let NodeKind::ExprStatement { expr } = &mut stmt.kind {
                if expr.tag() == Tag::Reduce {
                    let value = Box::new(expr.take());
                    stmt.kind = NodeKind::Return { value };
                    tracing::trace!("returned sole reduce");
                }
            }
        }
    }
    node
}

fn is_export_decl(node: &Node, _: &Path<'_>) -> bool {
    matches!(&node.kind, NodeKind::Export { decl: Some(_), .. })
}

/// Names an exportable declaration binds.
pub fn declared_names(decl: &Node) -> Vec<String> {
    match &decl.kind {
        NodeKind::Function { name, .. } => vec![name.clone()],
        NodeKind::Let { assignments } => assignments.iter().flat_map(declared_names).collect(),
        NodeKind::Assignment { target, .. } => {
            target.names().into_iter().map(str::to_string).collect()
        }
        NodeKind::Import { alias, .. } => vec![alias.clone()],
        NodeKind::From { items, .. } => {
            items.iter().map(|i| i.visible_name().to_string()).collect()
        }
        _ => vec![],
    }
}

fn split_exports(_: &mut W<'_>, run: Vec<Node>, _: &Path<'_>) -> Vec<Node> {
    let mut out = Vec::new();
    for stmt in run {
        match stmt.kind {
            NodeKind::Export { decl: Some(decl), mut items } => {
                items.extend(declared_names(&decl).iter().map(|n| ModuleItem::new(n)));
                tracing::trace!(exports = items.len(), "split export declaration");
                out.push(*decl);
                out.push(Node { id: stmt.id, span: stmt.span, kind: NodeKind::Export { decl: None, items } });
            }
            kind => out.push(Node { kind, ..stmt }),
        }
    }
    out
}
