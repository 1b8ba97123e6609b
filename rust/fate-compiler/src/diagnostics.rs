//! Node-attributed diagnostics with source snippets, colors, and suggestions.

use crate::compiler::ast::{Node, NodeId};
use crate::compiler::span::Span;
use std::fmt;
use strum::{Display, EnumIter, IntoStaticStr};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// Every problem the passes can report, each with a stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter)]
pub enum DiagnosticKind {
    #[strum(serialize = "DeclarationError")]
    Declaration,
    #[strum(serialize = "PatternContextError")]
    PatternContext,
    #[strum(serialize = "UsageError")]
    Usage,
    #[strum(serialize = "ArgumentError")]
    Argument,
    #[strum(serialize = "InternalInvariantError")]
    InternalInvariant,
    #[strum(serialize = "ShadowedFunction")]
    ShadowedFunction,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::Declaration => "E0001",
            DiagnosticKind::PatternContext => "E0002",
            DiagnosticKind::Usage => "E0003",
            DiagnosticKind::Argument => "E0004",
            DiagnosticKind::InternalInvariant => "E0005",
            DiagnosticKind::ShadowedFunction => "W0001",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::ShadowedFunction => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A problem attributed to one node of the tree being compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub node: NodeId,
    pub span: Span,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, node: &Node, message: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            node: node.id,
            span: node.span,
            message: message.into(),
            suggestions: vec![],
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render for logs and test output.
    pub fn render_plain(&self, source: &str, filename: &str) -> String {
        let mut out = String::new();

        let severity_label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        out.push_str(&format!("{}[{}]: {}\n", severity_label, self.kind.code(), self.message));

        if !self.span.is_dummy() {
            out.push_str(&format!("  --> {}:{}:{}\n", filename, self.span.line, self.span.col));
            if let Some(line_text) = get_source_line(source, self.span.line) {
                out.push_str("   |\n");
                out.push_str(&format!("{:>3} | {}\n", self.span.line, line_text));
                out.push_str(&format!("   | {}\n", self.underline()));
            }
        }

        if !self.suggestions.is_empty() {
            out.push_str("   |\n");
            for suggestion in &self.suggestions {
                out.push_str(&format!("   = help: {}\n", suggestion));
            }
        }

        out
    }

    fn underline(&self) -> String {
        make_underline(self.span.col, self.span.end.saturating_sub(self.span.start))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}: {}", self.kind, self.kind.code(), self.node.0, self.message)
    }
}

// Source excerpts
fn get_source_line(source: &str, line: usize) -> Option<String> {
    source.lines().nth(line.saturating_sub(1)).map(|s| s.to_string())
}

fn make_underline(col: usize, len: usize) -> String {
    format!("{}{}", " ".repeat(col.saturating_sub(1)), "^".repeat(len.max(1)))
}

// Edit distance for suggestions
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut row = vec![0; b_len + 1];
    for i in 1..=a_len {
        row[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b_len]
}

/// Up to three candidates within `max_distance` edits of `name`, closest first.
pub fn suggest_similar<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    max_distance: usize,
) -> Vec<String> {
    let mut matches: Vec<(usize, String)> = candidates
        .into_iter()
        .filter(|c| *c != name)
        .filter_map(|c| {
            let d = edit_distance(name, c);
            (d <= max_distance).then(|| (d, c.to_string()))
        })
        .collect();

    matches.sort();
    matches.dedup();
    matches.into_iter().map(|(_, s)| s).take(3).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::build::ident;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DiagnosticKind::Declaration.code(), "E0001");
        assert_eq!(DiagnosticKind::InternalInvariant.code(), "E0005");
        assert_eq!(DiagnosticKind::ShadowedFunction.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::Usage.to_string(), "UsageError");
    }

    #[test]
    fn plain_render_points_at_the_node() {
        let node = ident("lenght").with_span(Span::new(10, 16, 2, 8));
        let diag = Diagnostic::new(DiagnosticKind::Declaration, &node, "'lenght' is not declared")
            .with_suggestions(vec!["did you mean 'length'?".into()]);
        let source = "let xs = [1]\nreturn lenght(xs)\n";
        let rendered = diag.render_plain(source, "main.fate");
        assert_eq!(
            rendered,
            "error[E0001]: 'lenght' is not declared\n  --> main.fate:2:8\n   |\n  2 | return lenght(xs)\n   |        ^^^^^^\n   |\n   = help: did you mean 'length'?\n"
        );
    }

    #[test]
    fn dummy_spans_render_header_only() {
        let diag = Diagnostic::new(DiagnosticKind::Usage, &ident("x"), "nope");
        assert_eq!(diag.render_plain("", "f"), "error[E0003]: nope\n");
    }

    #[test]
    fn suggestions_rank_by_distance() {
        let found = suggest_similar("lenght", ["length", "left", "other"], 2);
        assert_eq!(found, vec!["length".to_string()]);
    }
}
