use super::names::pattern_local;
use super::writer::CodeBuf;
use super::{CodegenError, Frame, Generator, Result};
use crate::compiler::ast::{Node, NodeKind, Resolver};
use crate::compiler::builtins::*;
use fate_core::values::quote;
use fate_core::{BinaryOp, UnaryOp, Value};

/// Whether the generated JavaScript for `node` is already a boolean, so it
/// can be used as a condition without a truthiness check.
pub(super) fn is_boolean(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Literal { value } => matches!(value, Value::Bool(_)),
        NodeKind::Binary { op, .. } => op.is_relational(),
        NodeKind::Unary { op, .. } => *op == UnaryOp::Not,
        NodeKind::And { left, right } | NodeKind::Or { left, right } => {
            is_boolean(left) && is_boolean(right)
        }
        NodeKind::Call { callee, args } => {
            matches!(callee.kind, NodeKind::Pattern { .. }) && args.len() == 1
        }
        _ => false,
    }
}

impl<'a> Generator<'a> {
    pub(super) fn expr(&mut self, node: &Node) -> Result<String> {
        match &node.kind {
            NodeKind::Literal { value } => Ok(self.literal(value)),
            NodeKind::Identifier { name } => Ok(self.identifier(name)),
            NodeKind::Context => match self.annotations.context_local(node.id) {
                Some(local) => Ok(pattern_local(local)),
                None => Err(CodegenError::UnboundContext(node.id)),
            },
            NodeKind::Unary { op, operand } => {
                let inner = self.expr(operand)?;
                Ok(match op {
                    UnaryOp::Not if is_boolean(operand) => format!("!({})", inner),
                    UnaryOp::Not => format!("{}({})", self.runtime(IS_FALSE), inner),
                    UnaryOp::Neg => format!("(-{})", inner),
                })
            }
            NodeKind::Binary { op, left, right } => self.binary(*op, left, right),
            NodeKind::And { left, right } => self.logical(node, left, right, IS_FALSE),
            NodeKind::Or { left, right } => self.logical(node, left, right, IS_TRUE),
            NodeKind::Conditional { condition, consequent, alternative } => {
                let test = self.condition(condition)?;
                let yes = self.expr(consequent)?;
                let no = self.expr(alternative)?;
                Ok(format!("({} ? {} : {})", test, yes, no))
            }
            NodeKind::Array { elements } => {
                let items = elements.iter().map(|e| self.expr(e)).collect::<Result<Vec<_>>>()?;
                Ok(format!("[{}]", items.join(", ")))
            }
            NodeKind::Object { entries } => self.object(entries),
            NodeKind::Member { object, property } => {
                let mut target = self.callee(object)?;
                // `1.x` lexes as a malformed number.
                if matches!(object.kind, NodeKind::Literal { value: Value::Number(_) })
                    && !target.starts_with('(')
                {
                    target = format!("({})", target);
                }
                Ok(match &property.kind {
                    NodeKind::Identifier { name } => format!("{}.{}", target, name),
                    _ => format!("{}[{}]", target, self.expr(property)?),
                })
            }
            NodeKind::Call { callee, args } => match (&callee.kind, args.as_slice()) {
                (NodeKind::Pattern { .. }, [subject]) => {
                    let subject = self.expr(subject)?;
                    self.pattern_test(callee, &subject)
                }
                _ => {
                    let target = self.callee(callee)?;
                    let args = args.iter().map(|a| self.expr(a)).collect::<Result<Vec<_>>>()?;
                    Ok(format!("{}({})", target, args.join(", ")))
                }
            },
            NodeKind::Lambda { params, body } => self.lambda(params, body),
            NodeKind::Pattern { .. } => self.pattern_definition(node),
            NodeKind::Regex { pattern, flags } => {
                Ok(self.globals.builder(DEFINE_REGEX, &[quote(pattern), quote(flags)]))
            }
            NodeKind::Match { .. } | NodeKind::Reduce { .. } => self.iife(node),
            NodeKind::Do { body } => self.block(CREATE_DO_BLOCK, body),
            NodeKind::Generate { body } => self.block(CREATE_GENERATOR, body),
            NodeKind::Await { resolver, value } => {
                let builder = match resolver {
                    Resolver::Value => AWAIT_VALUE,
                    Resolver::Any => AWAIT_ANY,
                    Resolver::All => AWAIT_ALL,
                };
                let inner = self.expr(value)?;
                Ok(format!("(yield {}({}))", self.runtime(builder), inner))
            }
            NodeKind::Emit { value } => {
                let inner = self.expr(value)?;
                Ok(format!("(yield {}({}))", self.runtime(EMIT_VALUE), inner))
            }
            _ => Err(CodegenError::Unexpected { tag: node.tag(), position: "expression" }),
        }
    }

    /// A JavaScript boolean for `node`'s truthiness.
    pub(super) fn condition(&mut self, node: &Node) -> Result<String> {
        let js = self.expr(node)?;
        if is_boolean(node) {
            Ok(js)
        } else {
            Ok(format!("{}({})", self.runtime(IS_TRUE), js))
        }
    }

    pub(super) fn literal(&mut self, value: &Value) -> String {
        match value {
            Value::String(s) if s.chars().count() > self.options.inline_string_limit => {
                self.globals.literal(value.to_js())
            }
            Value::Array(_) | Value::Object(_) => self.globals.literal(value.to_js()),
            _ => value.to_js(),
        }
    }

    fn identifier(&mut self, name: &str) -> String {
        if self.host_global(name) {
            self.runtime(name)
        } else {
            self.read(name)
        }
    }

    /// Expressions in callee/object position, parenthesized unless simple.
    fn callee(&mut self, node: &Node) -> Result<String> {
        let js = self.expr(node)?;
        Ok(match node.kind {
            NodeKind::Identifier { .. }
            | NodeKind::Member { .. }
            | NodeKind::Call { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Array { .. } => js,
            _ if js.starts_with('(') && js.ends_with(')') => js,
            _ => format!("({})", js),
        })
    }

    fn binary(&mut self, op: BinaryOp, left: &Node, right: &Node) -> Result<String> {
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        Ok(match op {
            BinaryOp::In => format!("{}({}, {})", self.runtime(IS_IN), l, r),
            BinaryOp::NotIn => format!("!{}({}, {})", self.runtime(IS_IN), l, r),
            BinaryOp::Like => format!("{}({}, {})", self.runtime(IS_MATCH), r, l),
            _ => match op.js_operator() {
                Some(js_op) => format!("({} {} {})", l, js_op, r),
                None => return Err(CodegenError::Unexpected { tag: left.tag(), position: "operand" }),
            },
        })
    }

    /// `and`/`or` evaluate the left operand once; `short` is the truthiness
    /// check under which the left operand is the result.
    fn logical(&mut self, node: &Node, left: &Node, right: &Node, short: &str) -> Result<String> {
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        if is_boolean(node) {
            let js_op = if short == IS_FALSE { "&&" } else { "||" };
            return Ok(format!("({} {} {})", l, js_op, r));
        }
        let t = self.temp();
        Ok(format!("({}({} = {}) ? {} : {})", self.runtime(short), t, l, t, r))
    }

    fn object(&mut self, entries: &[Node]) -> Result<String> {
        if entries.is_empty() {
            return Ok("{}".to_string());
        }
        let mut parts = Vec::new();
        for entry in entries {
            let NodeKind::Entry { key, value } = &entry.kind else {
                return Err(CodegenError::Unexpected { tag: entry.tag(), position: "object entry" });
            };
            let key = match &key.kind {
                NodeKind::Literal { value: Value::String(s) } => quote(s),
                NodeKind::Identifier { name } => quote(name),
                _ => format!("[{}]", self.expr(key)?),
            };
            parts.push(format!("{}: {}", key, self.expr(value)?));
        }
        Ok(format!("{{ {} }}", parts.join(", ")))
    }

    /// Bind parameters in the current (fresh) frame. Returns the parameter
    /// list and the prologue collecting a variadic tail.
    pub(super) fn params(&mut self, params: &[Node]) -> Result<(Vec<String>, CodeBuf)> {
        let mut heads = Vec::new();
        let mut prologue = CodeBuf::new();
        for (i, p) in params.iter().enumerate() {
            let NodeKind::Param { name, variadic, .. } = &p.kind else {
                return Err(CodegenError::Unexpected { tag: p.tag(), position: "parameter" });
            };
            if *variadic {
                let id = self.write(name);
                let slice = self.runtime(SLICE_ARRAY);
                prologue.line(format!("{} = {}(arguments, {});", id, slice, i));
            } else {
                heads.push(self.write_param(name));
            }
        }
        Ok((heads, prologue))
    }

    fn lambda(&mut self, params: &[Node], body: &Node) -> Result<String> {
        let saved = self.names.clone();
        self.names = saved.derive();
        self.frames.push(Frame::default());
        let result = self.lambda_body(params, body);
        let frame = self.pop_frame();
        self.names = saved;
        let (heads, mut code) = result?;
        Ok(self.function_body(&format!("function ({})", heads.join(", ")), frame, &mut code))
    }

    fn lambda_body(&mut self, params: &[Node], body: &Node) -> Result<(Vec<String>, CodeBuf)> {
        let (heads, mut code) = self.params(params)?;
        let value = self.expr(body)?;
        code.line(format!("return {};", value));
        Ok((heads, code))
    }

    /// Expression-position `match`/`reduce` as an immediately invoked
    /// function with its own hoisting frame.
    fn iife(&mut self, node: &Node) -> Result<String> {
        let generator = self.in_generator();
        let saved = self.names.clone();
        self.names = saved.derive();
        self.frames.push(Frame { generator, ..Frame::default() });
        let mut code = CodeBuf::new();
        let result = match &node.kind {
            NodeKind::Reduce { .. } => self.reduce(node, &mut code).map(|value| {
                code.line(format!("return {};", value));
            }),
            _ => self.match_statement(node, true, &mut code),
        };
        let frame = self.pop_frame();
        self.names = saved;
        result?;
        Ok(if generator {
            format!("(yield* {})())", self.function_body("(function* ()", frame, &mut code))
        } else {
            format!("{})()", self.function_body("(function ()", frame, &mut code))
        })
    }

    /// `do`/`generate` bodies become generator functions handed to the
    /// runtime.
    fn block(&mut self, builder: &str, body: &[Node]) -> Result<String> {
        let saved = self.names.clone();
        self.names = saved.derive();
        self.frames.push(Frame { generator: true, ..Frame::default() });
        let result = self.statements(body);
        let frame = self.pop_frame();
        self.names = saved;
        let mut code = result?;
        let f = self.function_body("function* ()", frame, &mut code);
        Ok(format!("{}({})", self.runtime(builder), f))
    }
}
