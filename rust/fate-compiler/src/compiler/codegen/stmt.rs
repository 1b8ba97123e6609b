use super::writer::CodeBuf;
use super::{CodegenError, Frame, Generator, Result};
use crate::compiler::annotations::AnnotationKey;
use crate::compiler::ast::{ModuleItem, Node, NodeKind, Tag, Target};
use crate::compiler::builtins::{CREATE_ITERATOR, IMPORT_MODULE};
use crate::compiler::rewrite::declared_names;
use fate_core::values::quote;
use std::collections::BTreeSet;

/// One nested loop level: its `for (...)` head and the lines that open its
/// body (destructuring, guard).
type LoopLevel = (String, CodeBuf);

impl<'a> Generator<'a> {
    pub(super) fn statements(&mut self, body: &[Node]) -> Result<CodeBuf> {
        let mut code = CodeBuf::new();
        for stmt in body {
            self.statement(stmt, &mut code)?;
        }
        Ok(code)
    }

    fn statement(&mut self, node: &Node, code: &mut CodeBuf) -> Result<()> {
        match &node.kind {
            NodeKind::Let { assignments } => {
                for assignment in assignments {
                    self.statement(assignment, code)?;
                }
            }
            NodeKind::Assignment { target, value } => {
                let value = self.value(value, code)?;
                self.assign(target, value, code);
            }
            NodeKind::If { condition, then_body, else_body } => {
                let test = self.condition(condition)?;
                let bodies = [then_body.as_slice(), else_body.as_slice()];
                let mut arms = self.branch_set(&bodies, false)?.into_iter();
                let then_code = arms.next().unwrap_or_default();
                let else_code = arms.next().unwrap_or_default();
                let mut chain = vec![(format!("if ({})", test), then_code)];
                if !else_code.is_empty() {
                    chain.push(("else".to_string(), else_code));
                }
                code.chain(chain);
            }
            NodeKind::For { ranges, body, else_body } => {
                self.for_statement(ranges, body, else_body, code)?;
            }
            NodeKind::Return { value } => {
                let value = self.value(value, code)?;
                code.line(format!("return {};", value));
            }
            NodeKind::ExprStatement { expr } => match expr.kind {
                NodeKind::Match { .. } => self.match_statement(expr, false, code)?,
                NodeKind::Reduce { .. } => {
                    self.reduce(expr, code)?;
                }
                _ => {
                    let js = self.expr(expr)?;
                    if js.starts_with('{') || js.starts_with("function") {
                        code.line(format!("({});", js));
                    } else {
                        code.line(format!("{};", js));
                    }
                }
            },
            NodeKind::Function { .. } => self.function(node, code)?,
            NodeKind::Import { module, alias } => {
                let import = self.runtime(IMPORT_MODULE);
                let id = self.write(alias);
                code.line(format!("{} = {}($c, {});", id, import, quote(module)));
            }
            NodeKind::From { module, items } => {
                let import = self.runtime(IMPORT_MODULE);
                let t = self.temp();
                code.line(format!("{} = {}($c, {});", t, import, quote(module)));
                for item in items {
                    let id = self.write(item.visible_name());
                    code.line(format!("{} = {}[{}];", id, t, quote(&item.name)));
                }
            }
            NodeKind::Export { decl, items } => {
                let mut items = items.clone();
                if let Some(decl) = decl {
                    self.statement(decl, code)?;
                    items.extend(declared_names(decl).iter().map(|n| ModuleItem::new(n)));
                }
                for item in &items {
                    let id = self.read(&item.name);
                    code.line(format!("$x[{}] = {};", quote(item.visible_name()), id));
                }
            }
            _ => return Err(CodegenError::Unexpected { tag: node.tag(), position: "statement" }),
        }
        Ok(())
    }

    /// An expression that may be emitted as statements first; a `reduce`
    /// in value position of a statement is inlined rather than wrapped.
    fn value(&mut self, node: &Node, code: &mut CodeBuf) -> Result<String> {
        match node.kind {
            NodeKind::Reduce { .. } => self.reduce(node, code),
            _ => self.expr(node),
        }
    }

    /// Write `value` (already compiled) to every name of `target`.
    fn assign(&mut self, target: &Target, value: String, code: &mut CodeBuf) {
        match target {
            Target::Name(name) => {
                let id = self.write(name);
                code.line(format!("{} = {};", id, value));
            }
            _ => {
                let t = self.temp();
                code.line(format!("{} = {};", t, value));
                self.destructure(target, &t, code);
            }
        }
    }

    /// Write each name of a collection target from `source`.
    fn destructure(&mut self, target: &Target, source: &str, code: &mut CodeBuf) {
        match target {
            Target::Name(name) => {
                let id = self.write(name);
                code.line(format!("{} = {};", id, source));
            }
            Target::Array(names) => {
                for (i, name) in names.iter().enumerate() {
                    let id = self.write(name);
                    code.line(format!("{} = {}[{}];", id, source, i));
                }
            }
            Target::Object(pairs) => {
                for (key, name) in pairs {
                    let id = self.write(name);
                    code.line(format!("{} = {}[{}];", id, source, quote(key)));
                }
            }
        }
    }

    // ── Branch sets ─────────────────────────────────────────────────

    /// Generate each body against a private copy of the name table, then
    /// give every name any branch modified one merged id. Each branch ends
    /// by assigning its own version (or the pre-branch version) to it.
    fn branch_set(&mut self, bodies: &[&[Node]], result: bool) -> Result<Vec<CodeBuf>> {
        let base = self.names.clone();
        let mut arms = Vec::with_capacity(bodies.len());
        for body in bodies {
            self.names = base.clone();
            let generated = self.branch_body(body, result);
            let table = std::mem::replace(&mut self.names, base.clone());
            let terminates = matches!(body.last().map(Node::tag), Some(Tag::Return));
            arms.push((generated?, table, terminates));
        }

        let modified: BTreeSet<String> =
            arms.iter().flat_map(|(_, table, _)| table.modified_since(&base)).collect();
        for name in modified {
            let pre = self.read(&name);
            let merged = self.write(&name);
            for (code, table, terminates) in arms.iter_mut() {
                if *terminates {
                    continue;
                }
                let local = table.current(&name).unwrap_or(pre.as_str());
                code.line(format!("{} = {};", merged, local));
            }
            tracing::trace!(%name, %merged, "merged branch versions");
        }
        Ok(arms.into_iter().map(|(code, _, _)| code).collect())
    }

    /// A branch body. In result mode the value of a trailing expression
    /// statement is stored in the frame's result slot.
    fn branch_body(&mut self, body: &[Node], result: bool) -> Result<CodeBuf> {
        let Some((last, init)) = body.split_last().filter(|_| result) else {
            return self.statements(body);
        };
        let mut code = CodeBuf::new();
        for stmt in init {
            self.statement(stmt, &mut code)?;
        }
        match &last.kind {
            NodeKind::ExprStatement { expr } => {
                let value = self.value(expr, &mut code)?;
                self.frame().result_slot = true;
                code.line(format!("$v = {};", value));
            }
            _ => self.statement(last, &mut code)?,
        }
        Ok(code)
    }

    /// `match` as an `if` chain over the clause pattern tests. With `result`
    /// the chosen clause's trailing expression becomes the match value.
    pub(super) fn match_statement(
        &mut self,
        node: &Node,
        result: bool,
        code: &mut CodeBuf,
    ) -> Result<()> {
        let NodeKind::Match { value, clauses, else_body } = &node.kind else {
            return Err(CodegenError::Unexpected { tag: node.tag(), position: "match" });
        };
        let subject = self.value(value, code)?;
        let t = self.temp();
        code.line(format!("{} = {};", t, subject));

        let mut tests = Vec::with_capacity(clauses.len());
        let mut bodies: Vec<&[Node]> = Vec::with_capacity(clauses.len() + 1);
        for clause in clauses {
            let NodeKind::MatchClause { patterns, body } = &clause.kind else {
                return Err(CodegenError::Unexpected { tag: clause.tag(), position: "match clause" });
            };
            let alternatives =
                patterns.iter().map(|p| self.pattern_test(p, &t)).collect::<Result<Vec<_>>>()?;
            tests.push(alternatives.join(" || "));
            bodies.push(body);
        }
        if bodies.is_empty() && else_body.is_empty() {
            return Ok(());
        }
        bodies.push(else_body);

        let mut arms = self.branch_set(&bodies, result)?;
        let else_code = arms.pop().unwrap_or_default();
        let mut chain: Vec<(String, CodeBuf)> = Vec::new();
        for (i, (test, arm)) in tests.into_iter().zip(arms).enumerate() {
            let head = if i == 0 { "if" } else { "else if" };
            chain.push((format!("{} ({})", head, test), arm));
        }
        if chain.is_empty() {
            code.append(else_code);
        } else {
            if !else_code.is_empty() {
                chain.push(("else".to_string(), else_code));
            }
            code.chain(chain);
        }
        Ok(())
    }

    // ── Loops ───────────────────────────────────────────────────────

    /// Loop heads for `ranges`, binding each range target in the current
    /// table.
    fn loop_levels(&mut self, ranges: &[Node]) -> Result<Vec<LoopLevel>> {
        let mut levels = Vec::with_capacity(ranges.len());
        for range in ranges {
            let NodeKind::Range { target, collection, guard } = &range.kind else {
                return Err(CodegenError::Unexpected { tag: range.tag(), position: "range" });
            };
            let collection = self.expr(collection)?;
            let iterator = format!("{}({})", self.runtime(CREATE_ITERATOR), collection);
            let mut opening = CodeBuf::new();
            let var = match target {
                Target::Name(name) => self.write(name),
                _ => {
                    let t = self.temp();
                    self.destructure(target, &t, &mut opening);
                    t
                }
            };
            if let Some(guard) = guard {
                let test = self.condition(guard)?;
                opening.line(format!("if (!({})) continue;", test));
            }
            levels.push((format!("for ({} of {})", var, iterator), opening));
        }
        Ok(levels)
    }

    fn nest(levels: Vec<LoopLevel>, innermost: CodeBuf) -> CodeBuf {
        levels.into_iter().rev().fold(innermost, |inner, (head, mut opening)| {
            opening.append(inner);
            let mut wrapped = CodeBuf::new();
            wrapped.block(head, opening);
            wrapped
        })
    }

    fn for_statement(
        &mut self,
        ranges: &[Node],
        body: &[Node],
        else_body: &[Node],
        code: &mut CodeBuf,
    ) -> Result<()> {
        let ran = if else_body.is_empty() {
            None
        } else {
            let t = self.temp();
            code.line(format!("{} = false;", t));
            Some(t)
        };
        let saved = self.names.clone();
        self.names = saved.derive();
        let generated = self.loop_levels(ranges).and_then(|levels| {
            let mut inner = self.statements(body)?;
            if let Some(flag) = &ran {
                inner.line(format!("{} = true;", flag));
            }
            Ok(Self::nest(levels, inner))
        });
        self.names = saved;
        code.append(generated?);

        if let Some(flag) = ran {
            // The arm for a loop that ran only carries the merge assignments.
            let mut arms = self.branch_set(&[else_body, &[]], false)?.into_iter();
            let else_code = arms.next().unwrap_or_default();
            let ran_code = arms.next().unwrap_or_default();
            let mut chain = vec![(format!("if (!{})", flag), else_code)];
            if !ran_code.is_empty() {
                chain.push(("else".to_string(), ran_code));
            }
            code.chain(chain);
        }
        Ok(())
    }

    /// Emit a `reduce` as statements into `code`; returns the id holding
    /// its value (the first accumulator).
    pub(super) fn reduce(&mut self, node: &Node, code: &mut CodeBuf) -> Result<String> {
        let NodeKind::Reduce { accumulators, ranges, body } = &node.kind else {
            return Err(CodegenError::Unexpected { tag: node.tag(), position: "reduce" });
        };
        let saved = self.names.clone();
        self.names = saved.derive();
        let generated = self.reduce_body(accumulators, ranges, body, code);
        self.names = saved;
        generated
    }

    fn reduce_body(
        &mut self,
        accumulators: &[Node],
        ranges: &[Node],
        body: &[Node],
        code: &mut CodeBuf,
    ) -> Result<String> {
        let mut carried: Vec<(String, String)> = Vec::new();
        for acc in accumulators {
            let NodeKind::Assignment { target, value } = &acc.kind else {
                return Err(CodegenError::Unexpected { tag: acc.tag(), position: "accumulator" });
            };
            let value = self.value(value, code)?;
            self.assign(target, value, code);
            for name in target.names() {
                carried.push((name.to_string(), self.read(name)));
            }
        }

        let levels = self.loop_levels(ranges)?;
        let loop_table = self.names.clone();
        self.names = loop_table.derive();
        let mut inner = self.statements(body)?;
        for (name, id) in &carried {
            if let Some(local) = self.names.current(name) {
                if local != id {
                    inner.line(format!("{} = {};", id, local));
                }
            }
        }
        self.names = loop_table;
        code.append(Self::nest(levels, inner));

        Ok(carried.first().map(|(_, id)| id.clone()).unwrap_or_else(|| "undefined".into()))
    }

    // ── Functions ───────────────────────────────────────────────────

    fn function(&mut self, node: &Node, code: &mut CodeBuf) -> Result<()> {
        let NodeKind::Function { name, params, guard, body } = &node.kind else {
            return Err(CodegenError::Unexpected { tag: node.tag(), position: "function" });
        };
        let shadows = self.annotations.has(node.id, AnnotationKey::FunctionShadow);
        let previous = if guard.is_some() && shadows { Some(self.read(name)) } else { None };
        let id = self.write(name);

        let saved = self.names.clone();
        self.names = saved.derive();
        self.frames.push(Frame::default());
        let generated = self.function_inner(name, params, guard.as_deref(), body, previous);
        let frame = self.pop_frame();
        self.names = saved;

        let (heads, mut body_code) = generated?;
        let f = self.function_body(&format!("function ({})", heads.join(", ")), frame, &mut body_code);
        code.line(format!("{} = {};", id, f));
        Ok(())
    }

    fn function_inner(
        &mut self,
        name: &str,
        params: &[Node],
        guard: Option<&Node>,
        body: &[Node],
        previous: Option<String>,
    ) -> Result<(Vec<String>, CodeBuf)> {
        let (heads, mut code) = self.params(params)?;
        if let Some(guard) = guard {
            let test = self.condition(guard)?;
            let mut fail = CodeBuf::new();
            match previous {
                Some(previous) => fail.line(format!("return {}.apply(this, arguments);", previous)),
                None => fail.line(format!(
                    "throw new Error({});",
                    quote(&format!("no matching definition for '{}'", name))
                )),
            }
            code.block(format!("if (!({}))", test), fail);
        }
        code.append(self.statements(body)?);
        Ok((heads, code))
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::ast::{Node, Tree};
    use crate::compiler::build::*;
    use crate::compiler::codegen::generate;
    use crate::compiler::pipeline::{run_passes, PassKind};
    use crate::config::CompileOptions;
    use fate_core::BinaryOp;
    use pretty_assertions::assert_eq;

    fn body_of(body: Vec<Node>) -> String {
        let options = CompileOptions::default();
        let (tree, session) = run_passes(
            Tree::new(body),
            &[PassKind::Pattern, PassKind::Validate],
            &options,
        )
        .unwrap();
        let text = generate(&tree.root, &session.annotations, &options).unwrap().text;
        // Lines of the inner module function, unindented.
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.iter().position(|l| l.contains("return function ($c, $x)")).unwrap();
        lines[start + 1..lines.len() - 2].iter().map(|l| &l[4..]).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn writes_get_new_versions() {
        let body = body_of(vec![let_("x", num(1.0)), assign("x", num(2.0)), ret(ident("x"))]);
        assert_eq!(body, "let x, x$1;\nx = 1;\nx$1 = 2;\nreturn x$1;");
    }

    #[test]
    fn one_sided_write_merges_with_pre_branch_version() {
        let body = body_of(vec![
            let_("c", bool_(true)),
            let_("x", num(1.0)),
            if_(ident("c"), vec![assign("x", num(2.0))], vec![]),
            ret(ident("x")),
        ]);
        assert_eq!(
            body,
            [
                "let c, x, x$1, x$2;",
                "c = true;",
                "x = 1;",
                "if ($isTrue(c)) {",
                "  x$1 = 2;",
                "  x$2 = x$1;",
                "} else {",
                "  x$2 = x;",
                "}",
                "return x$2;",
            ]
            .join("\n")
        );
    }

    #[test]
    fn returning_branches_skip_merges() {
        let body = body_of(vec![
            let_("x", num(1.0)),
            if_(binary(BinaryOp::Gt, ident("x"), num(0.0)), vec![ret(num(0.0))], vec![assign("x", num(5.0))]),
            ret(ident("x")),
        ]);
        assert_eq!(
            body,
            [
                "let x, x$1, x$2;",
                "x = 1;",
                "if ((x > 0)) {",
                "  return 0;",
                "} else {",
                "  x$1 = 5;",
                "  x$2 = x$1;",
                "}",
                "return x$2;",
            ]
            .join("\n")
        );
    }

    #[test]
    fn for_loops_nest_and_guard() {
        let body = body_of(vec![
            let_("xs", array(vec![num(1.0), num(2.0)])),
            for_(
                vec![
                    range("a", ident("xs")),
                    guarded_range("b", ident("xs"), binary(BinaryOp::Lt, ident("a"), ident("b"))),
                ],
                vec![expr_stmt(array(vec![ident("a"), ident("b")]))],
                vec![],
            ),
        ]);
        assert_eq!(
            body,
            [
                "let xs, a, b;",
                "xs = [1, 2];",
                "for (a of $createIterator(xs)) {",
                "  for (b of $createIterator(xs)) {",
                "    if (!((a < b))) continue;",
                "    [a, b];",
                "  }",
                "}",
            ]
            .join("\n")
        );
    }

    #[test]
    fn for_else_merges_on_both_outcomes() {
        let body = body_of(vec![
            let_("x", num(1.0)),
            for_(vec![range("i", ident("x"))], vec![], vec![assign("x", num(9.0))]),
            ret(ident("x")),
        ]);
        assert_eq!(
            body,
            [
                "let x, $t1, i, x$1, x$2;",
                "x = 1;",
                "$t1 = false;",
                "for (i of $createIterator(x)) {",
                "  $t1 = true;",
                "}",
                "if (!$t1) {",
                "  x$1 = 9;",
                "  x$2 = x$1;",
                "} else {",
                "  x$2 = x;",
                "}",
                "return x$2;",
            ]
            .join("\n")
        );
    }

    #[test]
    fn reduce_copies_accumulators_back() {
        let body = body_of(vec![
            let_("xs", array(vec![num(1.0), num(2.0)])),
            let_(
                "total",
                reduce(
                    vec![assign("sum", num(0.0))],
                    vec![range("x", ident("xs"))],
                    vec![assign("sum", binary(BinaryOp::Add, ident("sum"), ident("x")))],
                ),
            ),
            ret(ident("total")),
        ]);
        assert_eq!(
            body,
            [
                "let xs, sum, x, sum$1, total;",
                "xs = [1, 2];",
                "sum = 0;",
                "for (x of $createIterator(xs)) {",
                "  sum$1 = (sum + x);",
                "  sum = sum$1;",
                "}",
                "total = sum;",
                "return total;",
            ]
            .join("\n")
        );
    }

    #[test]
    fn guarded_functions_throw_without_a_predecessor() {
        let f = func("f", vec![typed_param("a", ident("Integer"))], vec![ret(ident("a"))]);
        let body = body_of(vec![f]);
        assert!(body.contains("f = function (a) {"), "{}", body);
        assert!(body.contains("if (!($isInteger(a))) {"), "{}", body);
        assert!(body.contains("throw new Error(\"no matching definition for 'f'\");"), "{}", body);
    }

    #[test]
    fn shadowing_functions_delegate_to_their_predecessor() {
        let body = body_of(vec![
            func("f", vec![param("a")], vec![ret(num(0.0))]),
            func("f", vec![typed_param("a", ident("String"))], vec![ret(num(1.0))]),
        ]);
        assert!(body.contains("f$1 = function (a$1) {"), "{}", body);
        assert!(body.contains("return f.apply(this, arguments);"), "{}", body);
    }

    #[test]
    fn exports_publish_current_versions() {
        let body = body_of(vec![
            let_("a", num(1.0)),
            assign("a", num(2.0)),
            export_items(vec![item_as("a", "b")]),
        ]);
        assert!(body.ends_with("$x[\"b\"] = a$1;"), "{}", body);
    }

    #[test]
    fn match_statements_chain_clause_tests() {
        let body = body_of(vec![
            let_("v", num(2.0)),
            expr_stmt(match_(
                ident("v"),
                vec![
                    clause(vec![num(1.0), num(2.0)], vec![assign("v", str_("small"))]),
                    clause(vec![ident("String")], vec![]),
                ],
                vec![assign("v", str_("other"))],
            )),
            ret(ident("v")),
        ]);
        assert_eq!(
            body,
            [
                "let v, $t1, v$1, v$2, v$3;",
                "v = 2;",
                "$t1 = v;",
                "if (($t1 === 1) || ($t1 === 2)) {",
                "  v$1 = \"small\";",
                "  v$3 = v$1;",
                "} else if ($isString($t1)) {",
                "  v$3 = v;",
                "} else {",
                "  v$2 = \"other\";",
                "  v$3 = v$2;",
                "}",
                "return v$3;",
            ]
            .join("\n")
        );
    }
}
