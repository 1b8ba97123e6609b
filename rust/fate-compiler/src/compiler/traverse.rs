//! Generic traversal engine shared by every pass.
//!
//! A pass is a table of [`Visitor`]s plus a state value. [`run`] walks the
//! tree once: breadth visitors fire on the way down, depth visitors on the
//! way up, and statement-group visitors on each statement list once its
//! members have been walked. Handlers are plain function pointers that take
//! a node by value and return its replacement.

use crate::compiler::ast::{ChildMut, Node, NodeId, Tag};
use crate::compiler::pipeline::Session;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use std::collections::{HashMap, HashSet};

// ── Ancestor paths ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub id: NodeId,
    pub tag: Tag,
}

impl Frame {
    pub fn of(node: &Node) -> Self {
        Self { id: node.id, tag: node.tag() }
    }
}

/// Ancestors of the node being visited, nearest first. Each level of the
/// walk pushes a frame that lives on the walker's call stack.
#[derive(Debug, Clone, Copy)]
pub enum Path<'p> {
    Root,
    Frame { frame: Frame, parent: &'p Path<'p> },
}

impl<'p> Path<'p> {
    pub fn push(&'p self, frame: Frame) -> Path<'p> {
        Path::Frame { frame, parent: self }
    }

    pub fn iter(&self) -> PathIter<'_> {
        PathIter { cur: self }
    }

    pub fn parent(&self) -> Option<Frame> {
        match self {
            Path::Root => None,
            Path::Frame { frame, .. } => Some(*frame),
        }
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn find_ancestor(&self, pred: impl Fn(&Frame) -> bool) -> Option<Frame> {
        self.iter().find(|f| pred(f))
    }

    /// Whether any ancestor carries one of `tags`.
    pub fn has_ancestor_tags(&self, tags: &[Tag]) -> bool {
        self.iter().any(|f| tags.contains(&f.tag))
    }

    /// Nearest ancestor tagged with one of `tags`, provided no ancestor
    /// tagged with one of `barriers` sits between it and the current node.
    pub fn ancestor_tags(&self, tags: &[Tag], barriers: &[Tag]) -> Option<Frame> {
        for frame in self.iter() {
            if tags.contains(&frame.tag) {
                return Some(frame);
            }
            if barriers.contains(&frame.tag) {
                return None;
            }
        }
        None
    }

    /// Apply `f` to each ancestor, nearest first, up to the first one
    /// matching `stop`, which is returned and not passed to `f`.
    pub fn up_tree_until_match(
        &self,
        stop: impl Fn(&Frame) -> bool,
        mut f: impl FnMut(&Frame),
    ) -> Option<Frame> {
        for frame in self.iter() {
            if stop(&frame) {
                return Some(frame);
            }
            f(&frame);
        }
        None
    }
}

pub struct PathIter<'a> {
    cur: &'a Path<'a>,
}

impl<'a> Iterator for PathIter<'a> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        match self.cur {
            Path::Root => None,
            Path::Frame { frame, parent } => {
                let frame = *frame;
                self.cur = parent;
                Some(frame)
            }
        }
    }
}

// ── Predicates and visitors ─────────────────────────────────────────

pub type Handler<S> = fn(&mut Walker<'_, S>, Node, &Path<'_>) -> Node;
pub type GroupHandler<S> = fn(&mut Walker<'_, S>, Vec<Node>, &Path<'_>) -> Vec<Node>;

pub enum Predicate {
    Any,
    Tags(Vec<Tag>),
    /// See [`Path::ancestor_tags`].
    AncestorTags { tags: Vec<Tag>, barriers: Vec<Tag> },
    Custom(fn(&Node, &Path<'_>) -> bool),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, node: &Node, path: &Path<'_>) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Tags(tags) => tags.contains(&node.tag()),
            Predicate::AncestorTags { tags, barriers } => {
                path.ancestor_tags(tags, barriers).is_some()
            }
            Predicate::Custom(f) => f(node, path),
            Predicate::All(preds) => preds.iter().all(|p| p.matches(node, path)),
        }
    }
}

pub fn tags(tags: &[Tag]) -> Predicate {
    Predicate::Tags(tags.to_vec())
}

pub fn ancestor_tags(tags: &[Tag], barriers: &[Tag]) -> Predicate {
    Predicate::AncestorTags { tags: tags.to_vec(), barriers: barriers.to_vec() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Shallow-first: on the way down, before children.
    Breadth,
    /// Post-order: on the way up, after children.
    Depth,
}

pub enum Visitor<S> {
    Matching { order: Order, predicate: Predicate, handler: Handler<S> },
    ByTag { order: Order, table: HashMap<Tag, Handler<S>> },
    StatementGroups { predicate: Predicate, handler: GroupHandler<S>, group_size: usize },
}

pub fn matching<S>(handler: Handler<S>, predicate: Predicate) -> Visitor<S> {
    Visitor::Matching { order: Order::Depth, predicate, handler }
}

pub fn breadth_matching<S>(handler: Handler<S>, predicate: Predicate) -> Visitor<S> {
    Visitor::Matching { order: Order::Breadth, predicate, handler }
}

pub fn by_tag<S>(table: impl IntoIterator<Item = (Tag, Handler<S>)>) -> Visitor<S> {
    Visitor::ByTag { order: Order::Depth, table: table.into_iter().collect() }
}

pub fn breadth_by_tag<S>(table: impl IntoIterator<Item = (Tag, Handler<S>)>) -> Visitor<S> {
    Visitor::ByTag { order: Order::Breadth, table: table.into_iter().collect() }
}

/// Runs of one or more matching statements.
pub fn statements<S>(handler: GroupHandler<S>, predicate: Predicate) -> Visitor<S> {
    statement_groups(handler, predicate, 1)
}

pub fn statement_groups<S>(
    handler: GroupHandler<S>,
    predicate: Predicate,
    group_size: usize,
) -> Visitor<S> {
    Visitor::StatementGroups { predicate, handler, group_size: group_size.max(1) }
}

// ── Walker ──────────────────────────────────────────────────────────

/// Traversal driver handed to every handler.
pub struct Walker<'a, S> {
    visitors: &'a [Visitor<S>],
    pub session: &'a mut Session,
    pub state: S,
    walked: HashSet<NodeId>,
    aborted: Option<String>,
}

impl<'a, S> Walker<'a, S> {
    pub fn new(visitors: &'a [Visitor<S>], session: &'a mut Session, state: S) -> Self {
        Self { visitors, session, state, walked: HashSet::new(), aborted: None }
    }

    pub fn walk(&mut self, node: Node, path: &Path<'_>) -> Node {
        if self.aborted.is_some() {
            return node;
        }
        let mut node = self.apply(Order::Breadth, node, path);
        if !self.walked.remove(&node.id) {
            node = self.walk_children(node, path);
        }
        self.apply(Order::Depth, node, path)
    }

    /// Walk every child of `node`; `path` is the ancestor path of `node`.
    pub fn walk_children(&mut self, mut node: Node, path: &Path<'_>) -> Node {
        let inner = path.push(Frame::of(&node));
        for slot in node.children_mut() {
            if self.aborted.is_some() {
                break;
            }
            match slot {
                ChildMut::Node(child) => {
                    let taken = child.take();
                    *child = self.walk(taken, &inner);
                }
                ChildMut::List(list) => {
                    let items = std::mem::take(list);
                    *list = items.into_iter().map(|n| self.walk(n, &inner)).collect();
                }
                ChildMut::Body(list) => {
                    let items = std::mem::take(list);
                    let walked: Vec<Node> =
                        items.into_iter().map(|n| self.walk(n, &inner)).collect();
                    *list = self.apply_groups(walked, &inner);
                }
            }
        }
        node
    }

    /// Walk the children of `node` now and skip the regular descent
    /// afterwards. Lets a breadth handler process its own node after its
    /// children.
    pub fn recurse_into(&mut self, node: Node, path: &Path<'_>) -> Node {
        let node = self.walk_children(node, path);
        self.mark_walked(node.id);
        node
    }

    /// Skip the regular descent into a node whose children a handler has
    /// walked by hand.
    pub fn mark_walked(&mut self, id: NodeId) {
        self.walked.insert(id);
    }

    pub fn issue_error(&mut self, kind: DiagnosticKind, node: &Node, message: impl Into<String>) {
        self.session.report(Diagnostic::new(kind, node, message));
    }

    pub fn issue_warning(&mut self, kind: DiagnosticKind, node: &Node, message: impl Into<String>) {
        self.session.report(Diagnostic::new(kind, node, message));
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.session.report(diagnostic);
    }

    /// Stop the traversal after an internal invariant failed.
    pub fn abort(&mut self, node: &Node, message: impl Into<String>) {
        let message = message.into();
        self.session.report(Diagnostic::new(DiagnosticKind::InternalInvariant, node, message.clone()));
        if self.aborted.is_none() {
            self.aborted = Some(message);
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn fresh_id(&mut self) -> NodeId {
        self.session.fresh_id()
    }

    fn apply(&mut self, order: Order, mut node: Node, path: &Path<'_>) -> Node {
        let visitors = self.visitors;
        for visitor in visitors {
            if self.aborted.is_some() {
                break;
            }
            match visitor {
                Visitor::Matching { order: o, predicate, handler } if *o == order => {
                    if predicate.matches(&node, path) {
                        node = handler(self, node, path);
                    }
                }
                Visitor::ByTag { order: o, table } if *o == order => {
                    if let Some(handler) = table.get(&node.tag()) {
                        node = handler(self, node, path);
                    }
                }
                _ => {}
            }
        }
        node
    }

    fn apply_groups(&mut self, mut list: Vec<Node>, path: &Path<'_>) -> Vec<Node> {
        let visitors = self.visitors;
        for visitor in visitors {
            let Visitor::StatementGroups { predicate, handler, group_size } = visitor else {
                continue;
            };
            if self.aborted.is_some() {
                break;
            }
            let mut out = Vec::with_capacity(list.len());
            let mut run: Vec<Node> = Vec::new();
            for stmt in list {
                if predicate.matches(&stmt, path) {
                    run.push(stmt);
                    continue;
                }
                self.flush_run(&mut run, &mut out, *handler, *group_size, path);
                out.push(stmt);
            }
            self.flush_run(&mut run, &mut out, *handler, *group_size, path);
            list = out;
        }
        list
    }

    fn flush_run(
        &mut self,
        run: &mut Vec<Node>,
        out: &mut Vec<Node>,
        handler: GroupHandler<S>,
        group_size: usize,
        path: &Path<'_>,
    ) {
        if run.is_empty() {
            return;
        }
        let group = std::mem::take(run);
        if group.len() >= group_size {
            out.extend(handler(self, group, path));
        } else {
            out.extend(group);
        }
    }

    fn finish(self) -> (S, Option<String>) {
        (self.state, self.aborted)
    }
}

/// Outcome of one traversal.
pub struct Traversal<S> {
    pub root: Node,
    pub state: S,
    /// Set when a handler aborted on an internal invariant.
    pub aborted: Option<String>,
}

/// Walk `root` once with `visitors`.
pub fn run<S>(root: Node, visitors: &[Visitor<S>], session: &mut Session, state: S) -> Traversal<S> {
    let mut walker = Walker::new(visitors, session, state);
    let root = walker.walk(root, &Path::Root);
    let (state, aborted) = walker.finish();
    Traversal { root, state, aborted }
}
