//! Versioned name tables.
//!
//! Every write to a source name allocates a new generated id; reads return
//! the current (last) id. Branches run against private copies of the table
//! and are merged back by the statement generator.

use std::collections::{BTreeMap, HashMap};

const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
    "NaN", "Infinity",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Per-name version lists for one naming scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameTable {
    versions: BTreeMap<String, Vec<String>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, name: &str) -> Option<&str> {
        self.versions.get(name).and_then(|v| v.last()).map(String::as_str)
    }

    pub fn push(&mut self, name: &str, id: String) {
        self.versions.entry(name.to_string()).or_default().push(id);
    }

    /// Table for a nested scope: every name keeps only its visible id.
    pub fn derive(&self) -> NameTable {
        let versions = self
            .versions
            .iter()
            .filter_map(|(name, ids)| ids.last().map(|id| (name.clone(), vec![id.clone()])))
            .collect();
        NameTable { versions }
    }

    /// Names whose current id differs from `base`, in name order.
    pub fn modified_since(&self, base: &NameTable) -> Vec<String> {
        self.versions
            .keys()
            .filter(|name| self.current(name) != base.current(name))
            .cloned()
            .collect()
    }

    pub fn history(&self, name: &str) -> &[String] {
        self.versions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Module-wide id allocator; ids are unique across every scope of a module.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_version: HashMap<String, u32>,
    next_temp: u32,
}

impl IdAllocator {
    /// `x`, then `x$1`, `x$2`, ...; reserved words start at `x$0`.
    pub fn version(&mut self, name: &str) -> String {
        let counter = self.next_version.entry(name.to_string()).or_insert(0);
        let n = *counter;
        *counter += 1;
        if n == 0 && !is_reserved(name) {
            name.to_string()
        } else {
            format!("{}${}", name, n)
        }
    }

    pub fn temp(&mut self) -> String {
        self.next_temp += 1;
        format!("$t{}", self.next_temp)
    }
}

pub fn pattern_local(n: u32) -> String {
    format!("$p{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_unique() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.version("x"), "x");
        assert_eq!(ids.version("x"), "x$1");
        assert_eq!(ids.version("new"), "new$0");
        assert_eq!(ids.version("new"), "new$1");
        assert_eq!(ids.temp(), "$t1");
    }

    #[test]
    fn derived_tables_keep_only_visible_ids() {
        let mut t = NameTable::new();
        t.push("x", "x".into());
        t.push("x", "x$1".into());
        let d = t.derive();
        assert_eq!(d.history("x"), &["x$1".to_string()]);
        assert_eq!(d.current("x"), Some("x$1"));
    }

    #[test]
    fn modified_names_are_detected() {
        let mut base = NameTable::new();
        base.push("a", "a".into());
        base.push("b", "b".into());
        let mut branch = base.clone();
        branch.push("b", "b$1".into());
        branch.push("c", "c".into());
        assert_eq!(branch.modified_since(&base), vec!["b".to_string(), "c".to_string()]);
    }
}
