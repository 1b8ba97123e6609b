//! Pattern elaboration.
//!
//! Assigns scrutinee locals to patterns and their elements, resolves
//! `context` references to the local of the pattern that owns them, scores
//! pattern complexity, marks values that can be tested by plain equality,
//! and turns pattern-typed function parameters into a synthesized guard.

use crate::compiler::annotations::{Annotation, AnnotationKey};
use crate::compiler::ast::{Node, NodeKind, Tag};
use crate::compiler::pipeline::Session;
use crate::compiler::traverse::{self, breadth_by_tag, by_tag, Handler, Path, Walker};
use crate::diagnostics::DiagnosticKind;
use fate_core::BinaryOp;

/// Boundaries that own a scrutinee local.
pub const PATTERN_BOUNDARIES: &[Tag] = &[Tag::Pattern, Tag::PatternElement];
/// A `context` never resolves across these.
pub const CONTEXT_BARRIERS: &[Tag] = &[Tag::Function, Tag::Lambda];

#[derive(Debug, Default)]
pub struct PatternState {
    next_local: u32,
}

impl PatternState {
    fn fresh(&mut self) -> u32 {
        let n = self.next_local;
        self.next_local += 1;
        n
    }
}

type W<'a> = Walker<'a, PatternState>;

pub fn run(root: Node, session: &mut Session) -> Result<Node, String> {
    let down: [(Tag, Handler<PatternState>); 7] = [
        (Tag::Function, synthesize_guards),
        (Tag::MatchClause, wrap_clause_patterns),
        (Tag::Pattern, assign_pattern_local),
        (Tag::ObjectPattern, link_parent_local),
        (Tag::ArrayPattern, link_parent_local),
        (Tag::PatternElement, assign_element_local),
        (Tag::Context, resolve_context),
    ];
    let up: [(Tag, Handler<PatternState>); 2] =
        [(Tag::Pattern, finish_pattern), (Tag::PatternElement, finish_element)];
    let visitors = vec![breadth_by_tag(down), by_tag(up)];
    let out = traverse::run(root, &visitors, session, PatternState::default());
    match out.aborted {
        Some(message) => Err(message),
        None => Ok(out.root),
    }
}

/// Tag weights summed over a pattern's template.
pub fn complexity_weight(node: &Node) -> u32 {
    match &node.kind {
        NodeKind::Match { .. } => 5,
        NodeKind::ObjectPattern { .. } | NodeKind::ArrayPattern { .. } => 4,
        NodeKind::Call { .. } => 3,
        NodeKind::PatternElement { .. } | NodeKind::Regex { .. } => 2,
        NodeKind::Binary { op: BinaryOp::Like, .. } => 2,
        _ => 1,
    }
}

fn wrap_in_pattern(session: &mut Session, expr: Node) -> Node {
    let span = expr.span;
    session.number(Node::new(NodeKind::Pattern { expr: Box::new(expr) }).with_span(span))
}

/// Strip nested `pattern` wrappers so one boundary owns one local.
fn roll_up(mut node: Node) -> Node {
    loop {
        match node.kind {
            NodeKind::Pattern { expr } if expr.tag() == Tag::Pattern => node = *expr,
            kind => {
                node.kind = kind;
                return node;
            }
        }
    }
}

fn synthesize_guards(w: &mut W<'_>, mut node: Node, _: &Path<'_>) -> Node {
    let NodeKind::Function { name, params, guard, .. } = &mut node.kind else {
        return node;
    };
    let mut terms = Vec::new();
    for p in params.iter_mut() {
        let span = p.span;
        let NodeKind::Param { name: param_name, pattern, .. } = &mut p.kind else {
            continue;
        };
        let Some(pat) = pattern.take() else {
            continue;
        };
        let pat = match pat.tag() {
            Tag::Pattern => *pat,
            _ => wrap_in_pattern(w.session, *pat),
        };
        let arg = w
            .session
            .number(Node::new(NodeKind::Identifier { name: param_name.clone() }).with_span(span));
        let term = Node::new(NodeKind::Call { callee: Box::new(pat), args: vec![arg] });
        terms.push(w.session.number(term.with_span(span)));
    }
    if terms.is_empty() {
        return node;
    }
    tracing::trace!(function = %name, guards = terms.len(), "synthesized parameter guards");
    if let Some(existing) = guard.take() {
        terms.push(*existing);
    }
    let mut terms = terms.into_iter();
    if let Some(first) = terms.next() {
        let combined = terms.fold(first, |left, right| {
            let span = left.span.merge(right.span);
            let and = Node::new(NodeKind::And { left: Box::new(left), right: Box::new(right) });
            w.session.number(and.with_span(span))
        });
        *guard = Some(Box::new(combined));
    }
    node
}

fn wrap_clause_patterns(w: &mut W<'_>, mut node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::MatchClause { patterns, .. } = &mut node.kind {
        let taken = std::mem::take(patterns);
        *patterns = taken
            .into_iter()
            .map(|p| match p.tag() {
                Tag::Pattern => p,
                _ => wrap_in_pattern(w.session, p),
            })
            .collect();
    }
    node
}

fn assign_pattern_local(w: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    let node = roll_up(node);
    let local = w.state.fresh();
    w.session.annotations.annotate(node.id, Annotation::PatternLocal(local));
    if let NodeKind::Pattern { expr } = &node.kind {
        w.session.annotations.annotate(expr.id, Annotation::PatternLocal(local));
    }
    node
}

fn link_parent_local(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    let ann = &w.session.annotations;
    let local = ann.local(node.id).or_else(|| {
        path.ancestor_tags(PATTERN_BOUNDARIES, CONTEXT_BARRIERS)
            .and_then(|frame| ann.local(frame.id))
    });
    let local = match local {
        Some(local) => local,
        None => {
            let local = w.state.fresh();
            w.session.annotations.annotate(node.id, Annotation::PatternLocal(local));
            local
        }
    };
    w.session.annotations.annotate(node.id, Annotation::PatternParent(local));
    node
}

fn assign_element_local(w: &mut W<'_>, mut node: Node, path: &Path<'_>) -> Node {
    let parent = path.parent().and_then(|frame| w.session.annotations.parent_local(frame.id));
    let local = w.state.fresh();
    if let NodeKind::PatternElement { value, .. } = &mut node.kind {
        if value.tag() == Tag::Pattern {
            let rolled = roll_up(value.take());
            if let NodeKind::Pattern { expr } = rolled.kind {
                *value = expr;
            }
        }
        w.session.annotations.annotate(value.id, Annotation::PatternLocal(local));
    }
    w.session.annotations.annotate(node.id, Annotation::PatternLocal(local));
    if let Some(parent) = parent {
        w.session.annotations.annotate(node.id, Annotation::PatternParent(parent));
    }
    node
}

fn resolve_context(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    let Some(owner) = path.ancestor_tags(PATTERN_BOUNDARIES, CONTEXT_BARRIERS) else {
        w.issue_error(
            DiagnosticKind::PatternContext,
            &node,
            "relative context reference used outside of a pattern",
        );
        return node;
    };
    let Some(local) = w.session.annotations.local(owner.id) else {
        w.abort(&node, format!("pattern boundary {} has no local", owner.id.0));
        return node;
    };
    let ann = &mut w.session.annotations;
    ann.annotate(node.id, Annotation::PatternContext(local));
    path.up_tree_until_match(
        |frame| frame.id == owner.id,
        |frame| ann.annotate(frame.id, Annotation::PatternContext(local)),
    );
    node
}

fn finish_pattern(w: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::Pattern { expr } = &node.kind {
        let mut score = 0;
        expr.visit(&mut |n| score += complexity_weight(n));
        w.session.annotations.annotate(node.id, Annotation::PatternComplexity(score));
        mark_equality(w.session, expr);
    }
    node
}

fn finish_element(w: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::PatternElement { value, .. } = &node.kind {
        mark_equality(w.session, value);
    }
    node
}

fn mark_equality(session: &mut Session, value: &Node) {
    let ann = &session.annotations;
    if ann.has(value.id, AnnotationKey::PatternContext)
        || ann.has(value.id, AnnotationKey::PatternParent)
    {
        return;
    }
    if let NodeKind::Binary { op, .. } = &value.kind {
        if op.is_relational() {
            return;
        }
    }
    session.annotations.annotate(value.id, Annotation::PatternEquality);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Tree;
    use crate::compiler::build::*;

    fn elaborate(body: Vec<Node>) -> (Node, Session) {
        let tree = Tree::new(body);
        let (root, next) = tree.into_parts();
        let mut session = Session::new(next);
        let root = run(root, &mut session).unwrap();
        (root, session)
    }

    fn find(root: &Node, tag: Tag) -> Vec<Node> {
        let mut out = Vec::new();
        root.visit(&mut |n| {
            if n.tag() == tag {
                out.push(n.clone());
            }
        });
        out
    }

    #[test]
    fn nested_patterns_roll_up() {
        let (root, session) = elaborate(vec![expr_stmt(pattern(pattern(num(1.0))))]);
        let patterns = find(&root, Tag::Pattern);
        assert_eq!(patterns.len(), 1);
        let NodeKind::Pattern { expr } = &patterns[0].kind else { unreachable!() };
        assert_eq!(session.annotations.local(patterns[0].id), Some(0));
        assert_eq!(session.annotations.local(expr.id), Some(0));
        assert!(session.annotations.has(expr.id, AnnotationKey::PatternEquality));
    }

    #[test]
    fn elements_get_distinct_locals() {
        let (root, session) = elaborate(vec![expr_stmt(pattern(object_pattern(vec![
            ("name", str_("x")),
            ("tags", array_pattern(vec![num(1.0)])),
        ])))]);
        let ann = &session.annotations;
        let elements = find(&root, Tag::PatternElement);
        assert_eq!(elements.len(), 3);
        let locals: Vec<u32> = elements.iter().filter_map(|e| ann.local(e.id)).collect();
        assert_eq!(locals, vec![1, 2, 3]);
        let obj = &find(&root, Tag::ObjectPattern)[0];
        assert_eq!(ann.parent_local(obj.id), Some(0));
        assert_eq!(ann.parent_local(elements[0].id), Some(0));
        let arr = &find(&root, Tag::ArrayPattern)[0];
        assert_eq!(ann.parent_local(arr.id), Some(2));
        assert_eq!(ann.parent_local(elements[2].id), Some(2));
    }

    #[test]
    fn context_resolves_to_nearest_boundary() {
        let gt = binary(BinaryOp::Gt, context(), num(18.0));
        let (root, session) =
            elaborate(vec![expr_stmt(pattern(object_pattern(vec![("age", gt)])))]);
        let ann = &session.annotations;
        let element = &find(&root, Tag::PatternElement)[0];
        let element_local = ann.local(element.id).unwrap();
        let ctx = &find(&root, Tag::Context)[0];
        assert_eq!(ann.context_local(ctx.id), Some(element_local));
        let binary = &find(&root, Tag::Binary)[0];
        assert_eq!(ann.context_local(binary.id), Some(element_local));
        assert!(!ann.has(binary.id, AnnotationKey::PatternEquality));
        assert!(!ann.has(element.id, AnnotationKey::PatternContext));
        assert!(session.diagnostics.is_empty());
    }

    #[test]
    fn context_outside_pattern_is_an_error() {
        let (_, session) = elaborate(vec![expr_stmt(context())]);
        assert_eq!(session.diagnostics.len(), 1);
        assert_eq!(session.diagnostics[0].kind, DiagnosticKind::PatternContext);
    }

    #[test]
    fn context_does_not_cross_lambdas() {
        let inner = lambda(vec![], context());
        let (_, session) = elaborate(vec![expr_stmt(pattern(inner))]);
        assert_eq!(session.diagnostics.len(), 1);
    }

    #[test]
    fn complexity_sums_weights() {
        let (root, session) = elaborate(vec![expr_stmt(pattern(object_pattern(vec![(
            "a",
            regex("x+", ""),
        )])))]);
        let pat = &find(&root, Tag::Pattern)[0];
        // objectPattern 4 + element 2 + key literal 1 + regex 2
        assert_eq!(session.annotations.complexity(pat.id), Some(9));
    }

    #[test]
    fn typed_params_become_guards_in_order() {
        let f = guarded_func(
            "f",
            vec![typed_param("a", ident("Integer")), param("b"), typed_param("c", ident("String"))],
            Some(ident("ok")),
            vec![ret(ident("a"))],
        );
        let (root, _) = elaborate(vec![f]);
        let func = &find(&root, Tag::Function)[0];
        let NodeKind::Function { params, guard: Some(guard), .. } = &func.kind else {
            panic!("guard missing")
        };
        assert!(params.iter().all(|p| matches!(&p.kind, NodeKind::Param { pattern: None, .. })));
        // and(and(call(pattern Integer, a), call(pattern String, c)), ok)
        let NodeKind::And { left, right } = &guard.kind else { panic!("not and") };
        assert_eq!(right.identifier(), Some("ok"));
        let NodeKind::And { left: first, right: second } = &left.kind else { panic!("not and") };
        for (term, arg) in [(first, "a"), (second, "c")] {
            let NodeKind::Call { callee, args } = &term.kind else { panic!("not call") };
            assert_eq!(callee.tag(), Tag::Pattern);
            assert_eq!(args[0].identifier(), Some(arg));
        }
    }
}
