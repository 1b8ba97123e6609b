//! Pass ordering and the per-compile session shared by every pass.

use crate::compiler::annotations::Annotations;
use crate::compiler::ast::{Node, NodeId, Tree};
use crate::compiler::{pattern, rewrite, validate};
use crate::config::CompileOptions;
use crate::diagnostics::{Diagnostic, Severity};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PassKind {
    Pattern,
    Rewrite,
    Validate,
}

impl PassKind {
    /// Pattern, then rewrite, then validate.
    pub fn default_pipeline() -> Vec<PassKind> {
        vec![PassKind::Pattern, PassKind::Rewrite, PassKind::Validate]
    }
}

/// Raised when a pass aborted on an internal invariant.
#[derive(Debug, Error)]
#[error("{pass} pass aborted: {message}")]
pub struct PassAborted {
    pub pass: PassKind,
    pub message: String,
}

/// State owned by one compile: annotations, diagnostics, and the id
/// generator for synthesized nodes.
#[derive(Debug, Default)]
pub struct Session {
    pub annotations: Annotations,
    pub diagnostics: Vec<Diagnostic>,
    next_id: u32,
}

impl Session {
    pub fn new(next_id: u32) -> Self {
        Self { annotations: Annotations::new(), diagnostics: Vec::new(), next_id: next_id.max(1) }
    }

    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Give a synthesized node a fresh id.
    pub fn number(&mut self, mut node: Node) -> Node {
        node.id = self.fresh_id();
        node
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Run `passes` in order over `tree`.
///
/// Diagnostics accumulate in the returned session; only an internal
/// invariant failure stops the pipeline early.
pub fn run_passes(
    tree: Tree,
    passes: &[PassKind],
    options: &CompileOptions,
) -> Result<(Tree, Session), PassAborted> {
    let (mut root, next_id) = tree.into_parts();
    let mut session = Session::new(next_id);
    for &pass in passes {
        tracing::debug!(%pass, "running pass");
        let result = match pass {
            PassKind::Pattern => pattern::run(root, &mut session),
            PassKind::Rewrite => rewrite::run(root, &mut session),
            PassKind::Validate => validate::run(root, &mut session, options),
        };
        root = result.map_err(|message| PassAborted { pass, message })?;
        tracing::debug!(
            %pass,
            diagnostics = session.diagnostics.len(),
            "pass finished"
        );
    }
    let next = session.next_id();
    Ok((Tree::from_parts(root, next), session))
}
