//! Per-node metadata shared between passes.
//!
//! Annotations live in a side table keyed by node id and annotation kind, so
//! they stay attached to a node when a rewrite moves it.

use crate::compiler::ast::NodeId;
use std::collections::HashMap;
use strum::{Display, EnumDiscriminants};

#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[strum_discriminants(name(AnnotationKey), derive(Hash, Display))]
pub enum Annotation {
    /// Scrutinee local owned by a pattern or pattern element.
    PatternLocal(u32),
    /// Local of the collection pattern an object/array pattern destructures.
    PatternParent(u32),
    /// Owning pattern local for `context` references and their ancestors.
    PatternContext(u32),
    PatternComplexity(u32),
    /// The value can be tested with plain equality.
    PatternEquality,
    ScopeDeclarations(Vec<String>),
    /// A function that redefines a name already declared in its scope.
    FunctionShadow,
}

impl AnnotationKey {
    /// Namespaced name of the key, as used in dumps and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKey::PatternLocal => "pattern/local",
            AnnotationKey::PatternParent => "pattern/parent",
            AnnotationKey::PatternContext => "pattern/context",
            AnnotationKey::PatternComplexity => "pattern/complexity",
            AnnotationKey::PatternEquality => "pattern/equality",
            AnnotationKey::ScopeDeclarations => "scope/declarations",
            AnnotationKey::FunctionShadow => "function/shadow",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Annotations {
    table: HashMap<(NodeId, AnnotationKey), Annotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an annotation, replacing any previous value under the same key.
    pub fn annotate(&mut self, node: NodeId, value: Annotation) {
        let key = AnnotationKey::from(&value);
        tracing::trace!(node = node.0, key = key.as_str(), "annotate");
        self.table.insert((node, key), value);
    }

    pub fn get(&self, node: NodeId, key: AnnotationKey) -> Option<&Annotation> {
        self.table.get(&(node, key))
    }

    pub fn has(&self, node: NodeId, key: AnnotationKey) -> bool {
        self.table.contains_key(&(node, key))
    }

    pub fn local(&self, node: NodeId) -> Option<u32> {
        match self.get(node, AnnotationKey::PatternLocal) {
            Some(Annotation::PatternLocal(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn parent_local(&self, node: NodeId) -> Option<u32> {
        match self.get(node, AnnotationKey::PatternParent) {
            Some(Annotation::PatternParent(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn context_local(&self, node: NodeId) -> Option<u32> {
        match self.get(node, AnnotationKey::PatternContext) {
            Some(Annotation::PatternContext(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn complexity(&self, node: NodeId) -> Option<u32> {
        match self.get(node, AnnotationKey::PatternComplexity) {
            Some(Annotation::PatternComplexity(n)) => Some(*n),
            _ => None,
        }
    }

    /// Append `name` to a container's declarations unless already present.
    /// Returns `false` when the name was already declared there.
    pub fn declare(&mut self, container: NodeId, name: &str) -> bool {
        let entry = self
            .table
            .entry((container, AnnotationKey::ScopeDeclarations))
            .or_insert_with(|| Annotation::ScopeDeclarations(Vec::new()));
        match entry {
            Annotation::ScopeDeclarations(names) => {
                if names.iter().any(|n| n == name) {
                    false
                } else {
                    names.push(name.to_string());
                    true
                }
            }
            other => {
                *other = Annotation::ScopeDeclarations(vec![name.to_string()]);
                true
            }
        }
    }

    pub fn declarations(&self, container: NodeId) -> &[String] {
        match self.get(container, AnnotationKey::ScopeDeclarations) {
            Some(Annotation::ScopeDeclarations(names)) => names,
            _ => &[],
        }
    }

    pub fn is_declared(&self, container: NodeId, name: &str) -> bool {
        self.declarations(container).iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_overwrites() {
        let mut ann = Annotations::new();
        ann.annotate(NodeId(1), Annotation::PatternLocal(0));
        ann.annotate(NodeId(1), Annotation::PatternLocal(4));
        assert_eq!(ann.local(NodeId(1)), Some(4));
        assert_eq!(ann.len(), 1);
    }

    #[test]
    fn absent_annotations_read_as_none() {
        let ann = Annotations::new();
        assert!(!ann.has(NodeId(9), AnnotationKey::FunctionShadow));
        assert_eq!(ann.get(NodeId(9), AnnotationKey::PatternLocal), None);
        assert!(ann.declarations(NodeId(9)).is_empty());
    }

    #[test]
    fn declarations_accumulate_without_duplicates() {
        let mut ann = Annotations::new();
        assert!(ann.declare(NodeId(1), "a"));
        assert!(ann.declare(NodeId(1), "b"));
        assert!(!ann.declare(NodeId(1), "a"));
        assert_eq!(ann.declarations(NodeId(1)), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(AnnotationKey::ScopeDeclarations.as_str(), "scope/declarations");
        assert_eq!(
            AnnotationKey::from(&Annotation::PatternEquality),
            AnnotationKey::PatternEquality
        );
    }
}
