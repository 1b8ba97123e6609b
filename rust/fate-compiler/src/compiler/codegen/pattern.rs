//! Inline pattern tests.
//!
//! A test is a JavaScript boolean expression over a subject expression.
//! Collections and contextual values bind their subject to the `$p<n>`
//! local assigned during elaboration; everything else tests the subject in
//! place.

use super::names::pattern_local;
use super::writer::CodeBuf;
use super::{CodegenError, Frame, Generator, Result};
use crate::compiler::annotations::AnnotationKey;
use crate::compiler::ast::{Node, NodeKind, Tag};
use crate::compiler::builtins::{self, DEFINE_PATTERN, IS_ARRAY, IS_MATCH, IS_OBJECT};
use fate_core::values::quote;
use fate_core::Value;

impl<'a> Generator<'a> {
    /// Test `subject` against a pattern node or a bare template.
    pub(super) fn pattern_test(&mut self, node: &Node, subject: &str) -> Result<String> {
        let local = self
            .annotations
            .local(node.id)
            .ok_or(CodegenError::MissingPatternLocal(node.id))?;
        match &node.kind {
            NodeKind::Pattern { expr } => self.template_test(expr, local, subject),
            _ => self.template_test(node, local, subject),
        }
    }

    /// A pattern in value position: a runtime pattern object wrapping the
    /// compiled test.
    pub(super) fn pattern_definition(&mut self, node: &Node) -> Result<String> {
        let local = self
            .annotations
            .local(node.id)
            .ok_or(CodegenError::MissingPatternLocal(node.id))?;
        let param = pattern_local(local);
        let saved = self.names.clone();
        self.names = saved.derive();
        let mut frame = Frame::default();
        frame.params.insert(param.clone());
        self.frames.push(frame);
        let test = self.pattern_test(node, &param);
        let frame = self.pop_frame();
        self.names = saved;
        let mut code = CodeBuf::new();
        code.line(format!("return {};", test?));
        let f = self.function_body(&format!("function ({})", param), frame, &mut code);
        Ok(format!("{}({})", self.runtime(DEFINE_PATTERN), f))
    }

    fn template_test(&mut self, value: &Node, local: u32, subject: &str) -> Result<String> {
        let ann = self.annotations;
        match &value.kind {
            NodeKind::ObjectPattern { elements } => {
                self.collection_test(value, elements, local, subject, false)
            }
            NodeKind::ArrayPattern { elements } => {
                self.collection_test(value, elements, local, subject, true)
            }
            _ if value.tag() == Tag::Context
                || ann.has(value.id, AnnotationKey::PatternContext) =>
            {
                let p = pattern_local(local);
                let test = self.condition(value)?;
                Ok(match self.bind(&p, subject) {
                    Some(binding) => format!("({}, {})", binding, test),
                    None => test,
                })
            }
            NodeKind::Identifier { name } if self.names.current(name).is_none() => {
                match builtins::type_predicate(name) {
                    Some(predicate) => Ok(format!("{}({})", self.runtime(predicate), subject)),
                    None => self.match_test(value, subject),
                }
            }
            NodeKind::Regex { .. } => self.match_test(value, subject),
            NodeKind::Literal { value: lit }
                if lit.is_primitive() && ann.has(value.id, AnnotationKey::PatternEquality) =>
            {
                let lit = self.literal(lit);
                Ok(format!("({} === {})", subject, lit))
            }
            _ => self.match_test(value, subject),
        }
    }

    fn match_test(&mut self, value: &Node, subject: &str) -> Result<String> {
        let matcher = self.expr(value)?;
        Ok(format!("{}({}, {})", self.runtime(IS_MATCH), matcher, subject))
    }

    /// `$pN = subject` unless the subject already is `$pN`.
    fn bind(&mut self, p: &str, subject: &str) -> Option<String> {
        if p == subject {
            return None;
        }
        self.hoist(p);
        Some(format!("{} = {}", p, subject))
    }

    fn collection_test(
        &mut self,
        node: &Node,
        elements: &[Node],
        local: u32,
        subject: &str,
        is_array: bool,
    ) -> Result<String> {
        let parent = self.annotations.parent_local(node.id).unwrap_or(local);
        let p = pattern_local(parent);
        let binding = self.bind(&p, subject);
        let shape = if is_array { IS_ARRAY } else { IS_OBJECT };
        let mut parts = vec![format!("{}({})", self.runtime(shape), p)];
        if is_array {
            parts.push(format!("{}.length === {}", p, elements.len()));
        }
        for (i, element) in elements.iter().enumerate() {
            let NodeKind::PatternElement { key, value } = &element.kind else {
                return Err(CodegenError::Unexpected {
                    tag: element.tag(),
                    position: "pattern element",
                });
            };
            let access = match key.as_deref() {
                None => format!("{}[{}]", p, i),
                Some(Node { kind: NodeKind::Literal { value: Value::String(k) }, .. }) => {
                    format!("{}[{}]", p, quote(k))
                }
                Some(Node { kind: NodeKind::Identifier { name }, .. }) => {
                    format!("{}[{}]", p, quote(name))
                }
                Some(key) => format!("{}[{}]", p, self.expr(key)?),
            };
            let element_local = self
                .annotations
                .local(element.id)
                .ok_or(CodegenError::MissingPatternLocal(element.id))?;
            parts.push(self.template_test(value, element_local, &access)?);
        }
        let test = parts.join(" && ");
        Ok(match binding {
            Some(binding) => format!("({}, {})", binding, test),
            None => format!("({})", test),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::ast::Tree;
    use crate::compiler::build::*;
    use crate::compiler::codegen::generate;
    use crate::compiler::pipeline::{run_passes, PassKind};
    use crate::config::CompileOptions;
    use fate_core::BinaryOp;

    fn compile(body: Vec<crate::compiler::ast::Node>) -> String {
        let options = CompileOptions::default();
        let (tree, session) =
            run_passes(Tree::new(body), &[PassKind::Pattern], &options).unwrap();
        generate(&tree.root, &session.annotations, &options).unwrap().text
    }

    #[test]
    fn primitive_literals_test_by_identity() {
        let text = compile(vec![expr_stmt(call(pattern(num(3.0)), vec![num(3.0)]))]);
        assert!(text.contains("(3 === 3);"), "{}", text);
    }

    #[test]
    fn object_patterns_bind_once_and_check_shape() {
        let gt = binary(BinaryOp::Gt, context(), num(18.0));
        let pat = pattern(object_pattern(vec![("name", str_("x")), ("age", gt)]));
        let text = compile(vec![let_("v", object(vec![])), expr_stmt(call(pat, vec![ident("v")]))]);
        assert!(
            text.contains(
                "($p0 = v, $isObject($p0) && ($p0[\"name\"] === \"x\") && ($p2 = $p0[\"age\"], ($p2 > 18)));"
            ),
            "{}",
            text
        );
        assert!(text.contains("let v, $p0, $p2;"), "{}", text);
    }

    #[test]
    fn array_patterns_match_exact_length() {
        let pat = pattern(array_pattern(vec![num(1.0), ident("Integer")]));
        let text = compile(vec![let_("v", array(vec![])), expr_stmt(call(pat, vec![ident("v")]))]);
        assert!(
            text.contains("($p0 = v, $isArray($p0) && $p0.length === 2 && ($p0[0] === 1) && $isInteger($p0[1]));"),
            "{}",
            text
        );
    }

    #[test]
    fn value_position_patterns_define_runtime_patterns() {
        let text = compile(vec![let_("p", pattern(regex("a+", "i")))]);
        assert!(text.contains("const $b0 = $r.defineRegex(\"a+\", \"i\");"), "{}", text);
        assert!(text.contains("p = $definePattern(function ($p0) {"), "{}", text);
        assert!(text.contains("return $isMatch($b0, $p0);"), "{}", text);
    }
}
