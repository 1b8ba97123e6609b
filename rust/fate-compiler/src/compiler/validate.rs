//! Scope validation: declare-before-use, parameter checks, and placement
//! rules for `await`/`emit`.
//!
//! Declarations are recorded as `scope/declarations` annotations on the
//! nearest scope container; lookups walk the ancestor path outward.

use crate::compiler::annotations::Annotation;
use crate::compiler::ast::{Node, NodeId, NodeKind, Tag, Target};
use crate::compiler::pipeline::Session;
use crate::compiler::traverse::{self, breadth_by_tag, Frame, Handler, Path, Walker};
use crate::config::CompileOptions;
use crate::diagnostics::{suggest_similar, Diagnostic, DiagnosticKind};
use std::collections::HashSet;

type W<'a> = Walker<'a, ()>;

/// `await`/`emit` cannot reach their block across these.
const USAGE_BARRIERS: &[Tag] = &[Tag::Function, Tag::Lambda, Tag::Pattern];

pub fn run(root: Node, session: &mut Session, options: &CompileOptions) -> Result<Node, String> {
    for name in &options.globals {
        session.annotations.declare(root.id, name);
    }
    let table: [(Tag, Handler<()>); 12] = [
        (Tag::Identifier, check_reference),
        (Tag::Member, check_member),
        (Tag::Function, declare_function),
        (Tag::Lambda, declare_lambda),
        (Tag::Assignment, declare_assignment),
        (Tag::Range, declare_range),
        (Tag::Import, declare_import),
        (Tag::From, declare_import),
        (Tag::Export, check_exports),
        (Tag::Await, check_await),
        (Tag::Emit, check_emit),
        (Tag::Entry, check_entry),
    ];
    let visitors = vec![breadth_by_tag(table)];
    let out = traverse::run(root, &visitors, session, ());
    match out.aborted {
        Some(message) => Err(message),
        None => Ok(out.root),
    }
}

fn nearest_container(path: &Path<'_>) -> Option<Frame> {
    path.find_ancestor(|f| f.tag.is_scope_container())
}

/// Declare `names` in the container enclosing the current node.
fn declare_all<'n>(w: &mut W<'_>, node: &Node, path: &Path<'_>, names: impl IntoIterator<Item = &'n str>) {
    let Some(container) = nearest_container(path) else {
        w.abort(node, "no scope container found");
        return;
    };
    for name in names {
        w.session.annotations.declare(container.id, name);
    }
}

fn is_visible(session: &Session, path: &Path<'_>, name: &str) -> bool {
    path.iter()
        .filter(|f| f.tag.is_scope_container())
        .any(|f| session.annotations.is_declared(f.id, name))
}

fn visible_names(session: &Session, path: &Path<'_>) -> Vec<String> {
    path.iter()
        .filter(|f| f.tag.is_scope_container())
        .flat_map(|f| session.annotations.declarations(f.id).to_vec())
        .collect()
}

fn report_undeclared(w: &mut W<'_>, node: &Node, path: &Path<'_>, name: &str) {
    let candidates = visible_names(w.session, path);
    let suggestions = suggest_similar(name, candidates.iter().map(String::as_str), 2)
        .into_iter()
        .map(|s| format!("did you mean '{}'?", s))
        .collect();
    let message = format!("'{}' is used before it is declared", name);
    w.report(Diagnostic::new(DiagnosticKind::Declaration, node, message).with_suggestions(suggestions));
}

fn check_reference(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    if let NodeKind::Identifier { name } = &node.kind {
        if !is_visible(w.session, path, name) {
            report_undeclared(w, &node, path, name);
        }
    }
    node
}

/// A bare identifier property names a field, not a binding.
fn check_member(w: &mut W<'_>, mut node: Node, path: &Path<'_>) -> Node {
    let inner = path.push(Frame::of(&node));
    if let NodeKind::Member { object, property } = &mut node.kind {
        let taken = object.take();
        **object = w.walk(taken, &inner);
        if property.tag() != Tag::Identifier {
            let taken = property.take();
            **property = w.walk(taken, &inner);
        }
    }
    w.mark_walked(node.id);
    node
}

/// Object keys are names, not references.
fn check_entry(w: &mut W<'_>, mut node: Node, path: &Path<'_>) -> Node {
    let inner = path.push(Frame::of(&node));
    if let NodeKind::Entry { key, value } = &mut node.kind {
        if key.tag() != Tag::Identifier {
            let taken = key.take();
            **key = w.walk(taken, &inner);
        }
        let taken = value.take();
        **value = w.walk(taken, &inner);
    }
    w.mark_walked(node.id);
    node
}

fn check_params(w: &mut W<'_>, owner: NodeId, params: &[Node]) {
    let mut seen = HashSet::new();
    for (i, p) in params.iter().enumerate() {
        let NodeKind::Param { name, variadic, .. } = &p.kind else {
            continue;
        };
        if !seen.insert(name.as_str()) {
            w.issue_error(
                DiagnosticKind::Argument,
                p,
                format!("duplicate parameter name '{}'", name),
            );
        }
        if *variadic && i + 1 != params.len() {
            w.issue_error(
                DiagnosticKind::Argument,
                p,
                format!("variadic parameter '{}' must be the last parameter", name),
            );
        }
        w.session.annotations.declare(owner, name);
    }
}

fn declare_function(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    let NodeKind::Function { name, params, .. } = &node.kind else {
        return node;
    };
    let Some(container) = nearest_container(path) else {
        w.abort(&node, "no scope container found");
        return node;
    };
    if !w.session.annotations.declare(container.id, name) {
        w.session.annotations.annotate(node.id, Annotation::FunctionShadow);
        w.issue_warning(
            DiagnosticKind::ShadowedFunction,
            &node,
            format!("function '{}' redefines an existing declaration", name),
        );
    }
    check_params(w, node.id, params);
    node
}

fn declare_lambda(w: &mut W<'_>, node: Node, _: &Path<'_>) -> Node {
    if let NodeKind::Lambda { params, .. } = &node.kind {
        check_params(w, node.id, params);
    }
    node
}

fn declare_assignment(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    let node = w.recurse_into(node, path);
    if let NodeKind::Assignment { target, .. } = &node.kind {
        declare_all(w, &node, path, target.names());
    }
    node
}

fn declare_range(w: &mut W<'_>, mut node: Node, path: &Path<'_>) -> Node {
    let inner = path.push(Frame::of(&node));
    let mut target = Target::Name(String::new());
    if let NodeKind::Range { target: t, collection, .. } = &mut node.kind {
        let taken = collection.take();
        **collection = w.walk(taken, &inner);
        target = t.clone();
    }
    declare_all(w, &node, path, target.names());
    if let NodeKind::Range { guard: Some(guard), .. } = &mut node.kind {
        let taken = guard.take();
        **guard = w.walk(taken, &inner);
    }
    w.mark_walked(node.id);
    node
}

fn declare_import(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    match &node.kind {
        NodeKind::Import { alias, .. } => declare_all(w, &node, path, [alias.as_str()]),
        NodeKind::From { items, .. } => {
            declare_all(w, &node, path, items.iter().map(|i| i.visible_name()))
        }
        _ => {}
    }
    node
}

fn check_exports(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    if let NodeKind::Export { items, .. } = &node.kind {
        for item in items {
            if !is_visible(w.session, path, &item.name) {
                report_undeclared(w, &node, path, &item.name);
            }
        }
    }
    node
}

fn check_await(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    if path.ancestor_tags(&[Tag::Do], USAGE_BARRIERS).is_none() {
        w.issue_error(DiagnosticKind::Usage, &node, "'await' can only be used inside a 'do' block");
    }
    node
}

fn check_emit(w: &mut W<'_>, node: Node, path: &Path<'_>) -> Node {
    if path.ancestor_tags(&[Tag::Generate], USAGE_BARRIERS).is_none() {
        w.issue_error(
            DiagnosticKind::Usage,
            &node,
            "'emit' can only be used inside a 'generate' block",
        );
    }
    node
}
