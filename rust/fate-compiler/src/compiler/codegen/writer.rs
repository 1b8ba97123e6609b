//! Indented line buffer for generated code.

/// Lines at relative nesting depths. A line may contain embedded newlines
/// (a function expression inside a statement); continuation lines are
/// indented relative to the line that holds them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeBuf {
    lines: Vec<(usize, String)>,
}

impl CodeBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push((0, text.into()));
    }

    /// Append `inner` one level deeper.
    pub fn nested(&mut self, inner: CodeBuf) {
        self.lines.extend(inner.lines.into_iter().map(|(d, t)| (d + 1, t)));
    }

    pub fn append(&mut self, other: CodeBuf) {
        self.lines.extend(other.lines);
    }

    /// `head {` + nested body + `}`.
    pub fn block(&mut self, head: impl Into<String>, body: CodeBuf) {
        self.line(format!("{} {{", head.into()));
        self.nested(body);
        self.line("}");
    }

    /// An `if` / `else if` / `else` chain from `(head, body)` arms, e.g.
    /// `("if (a)", ..)`, `("else", ..)`.
    pub fn chain(&mut self, arms: Vec<(String, CodeBuf)>) {
        let mut first = true;
        for (head, body) in arms {
            if first {
                self.line(format!("{} {{", head));
                first = false;
            } else {
                self.line(format!("}} {} {{", head));
            }
            self.nested(body);
        }
        if !first {
            self.line("}");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Render every line at `base + depth` levels of `indent` spaces.
    pub fn render(&self, indent: usize, base: usize) -> String {
        let mut out = String::new();
        for (i, (depth, text)) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let pad = " ".repeat(indent * (base + depth));
            for (j, part) in text.split('\n').enumerate() {
                if j > 0 {
                    out.push('\n');
                }
                if !part.is_empty() {
                    out.push_str(&pad);
                    out.push_str(part);
                }
            }
        }
        out
    }
}

/// A function expression: `head {` body `}` as one multi-line string.
pub fn function_text(head: &str, body: &CodeBuf, indent: usize) -> String {
    if body.is_empty() {
        return format!("{} {{}}", head);
    }
    format!("{} {{\n{}\n}}", head, body.render(indent, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_indent() {
        let mut inner = CodeBuf::new();
        inner.line("x = 1;");
        let mut buf = CodeBuf::new();
        buf.block("if (a)", inner);
        assert_eq!(buf.render(2, 0), "if (a) {\n  x = 1;\n}");
        assert_eq!(buf.render(2, 1), "  if (a) {\n    x = 1;\n  }");
    }

    #[test]
    fn chains_share_closing_braces() {
        let mut a = CodeBuf::new();
        a.line("x = 1;");
        let mut b = CodeBuf::new();
        b.line("x = 2;");
        let mut buf = CodeBuf::new();
        buf.chain(vec![("if (a)".into(), a), ("else".into(), b)]);
        assert_eq!(buf.render(2, 0), "if (a) {\n  x = 1;\n} else {\n  x = 2;\n}");
    }

    #[test]
    fn embedded_function_text_follows_its_line() {
        let mut body = CodeBuf::new();
        body.line("return a;");
        let f = function_text("function (a)", &body, 2);
        let mut buf = CodeBuf::new();
        let mut inner = CodeBuf::new();
        inner.line(format!("f = {};", f));
        buf.block("if (c)", inner);
        assert_eq!(buf.render(2, 0), "if (c) {\n  f = function (a) {\n    return a;\n  };\n}");
    }
}
