//! Reference interpreter.
//!
//! Evaluates a tree after the passes have run, with the scoping the code
//! generator encodes: `if`/`match` branches write into the enclosing
//! scope, loop bodies run in a per-iteration copy, `reduce` accumulators
//! are carried across iterations, and a guarded function whose guard fails
//! falls back to the definition it shadows. Closures capture a snapshot of
//! the scope they are defined in.
//!
//! Concurrency (`do`, `generate`, `await`, `emit`) and module imports are
//! out of reach here and report [`EvalError::Unsupported`].

use crate::compiler::annotations::{AnnotationKey, Annotations};
use crate::compiler::ast::{Node, NodeId, NodeKind, Tag, Target};
use crate::compiler::builtins;
use fate_core::ops::{apply_binary, apply_unary, strict_equals};
use fate_core::{BinaryOp, UnaryOp, Value};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("'{0}' is not defined")]
    Undefined(String),
    #[error("a {0} is not callable")]
    NotCallable(&'static str),
    #[error("no matching definition for '{0}'")]
    NoMatchingDefinition(String),
    #[error("'{0}' is not supported by the interpreter")]
    Unsupported(Tag),
    #[error("operator '{op}' is not defined for {left} and {right}")]
    Operator { op: String, left: &'static str, right: &'static str },
    #[error("a {0} cannot be stored in a collection")]
    NotData(&'static str),
    #[error("cannot iterate over a {0}")]
    NotIterable(&'static str),
    #[error("context reference {0:?} has no owning pattern local")]
    UnboundContext(NodeId),
    #[error("pattern node {0:?} has no local")]
    MissingPatternLocal(NodeId),
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

pub type EvalResult<T> = Result<T, EvalError>;

type Env = HashMap<String, Val>;

/// A host function callable from interpreted code.
#[derive(Clone)]
pub struct NativeFn(Rc<dyn Fn(&[Val]) -> EvalResult<Val>>);

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native>")
    }
}

#[derive(Debug, Clone)]
enum Body {
    Block(Vec<Node>),
    Expr(Node),
}

#[derive(Debug)]
pub struct Closure {
    name: Option<String>,
    params: Vec<Node>,
    guard: Option<Node>,
    body: Body,
    env: Env,
    previous: Option<Val>,
}

/// A pattern in value position, with the scope it was defined in.
#[derive(Debug)]
pub struct PatternValue {
    node: Node,
    env: Env,
}

#[derive(Debug, Clone)]
pub enum Val {
    Data(Value),
    Function(Rc<Closure>),
    Native(NativeFn),
    Pattern(Rc<PatternValue>),
    Regex(Rc<Regex>),
    /// A type name such as `Integer` used as a value.
    Type(String),
}

impl Val {
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Data(v) => v.type_name(),
            Val::Function(_) | Val::Native(_) => "function",
            Val::Pattern(_) => "pattern",
            Val::Regex(_) => "regex",
            Val::Type(_) => "type",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Data(v) => v.is_truthy(),
            _ => true,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Val::Data(v) => Some(v),
            _ => None,
        }
    }

    fn into_data(self) -> EvalResult<Value> {
        match self {
            Val::Data(v) => Ok(v),
            other => Err(EvalError::NotData(other.type_name())),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Data(a), Val::Data(b)) => a == b,
            (Val::Function(a), Val::Function(b)) => Rc::ptr_eq(a, b),
            (Val::Native(a), Val::Native(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Val::Pattern(a), Val::Pattern(b)) => Rc::ptr_eq(a, b),
            (Val::Regex(a), Val::Regex(b)) => Rc::ptr_eq(a, b),
            (Val::Type(a), Val::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for Val {
    fn from(v: Value) -> Self {
        Val::Data(v)
    }
}

enum Flow {
    Next,
    Return(Val),
}

pub struct Interpreter<'a> {
    annotations: &'a Annotations,
    natives: HashMap<String, NativeFn>,
    locals: HashMap<u32, Val>,
    exports: Vec<(String, Val)>,
    regexes: HashMap<(String, String), Rc<Regex>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(annotations: &'a Annotations) -> Self {
        Self {
            annotations,
            natives: HashMap::new(),
            locals: HashMap::new(),
            exports: Vec::new(),
            regexes: HashMap::new(),
        }
    }

    /// Make a host function visible under `name` wherever no local binding
    /// shadows it.
    pub fn register(&mut self, name: &str, f: impl Fn(&[Val]) -> EvalResult<Val> + 'static) {
        self.natives.insert(name.to_string(), NativeFn(Rc::new(f)));
    }

    /// Run a module; its value is that of a top-level `return`, if any.
    pub fn run(&mut self, root: &Node) -> EvalResult<Val> {
        let NodeKind::Module { body } = &root.kind else {
            return self.eval(root, &Env::new());
        };
        let mut env = Env::new();
        match self.exec_block(body, &mut env)? {
            Flow::Return(v) => Ok(v),
            Flow::Next => Ok(Val::Data(Value::Nothing)),
        }
    }

    pub fn exports(&self) -> &[(String, Val)] {
        &self.exports
    }

    // ── Statements ──────────────────────────────────────────────────

    fn exec_block(&mut self, body: &[Node], env: &mut Env) -> EvalResult<Flow> {
        for stmt in body {
            if let Flow::Return(v) = self.exec(stmt, env)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, node: &Node, env: &mut Env) -> EvalResult<Flow> {
        match &node.kind {
            NodeKind::Let { assignments } => return self.exec_block(assignments, env),
            NodeKind::Assignment { target, value } => {
                let v = self.eval(value, env)?;
                bind(target, v, env);
            }
            NodeKind::If { condition, then_body, else_body } => {
                let body = if self.eval(condition, env)?.is_truthy() { then_body } else { else_body };
                return self.exec_block(body, env);
            }
            NodeKind::For { ranges, body, else_body } => {
                let mut scope = env.clone();
                let mut ran = false;
                if let Flow::Return(v) =
                    self.ranges(ranges, 0, &mut scope, &Env::new(), &[], body, &mut ran)?
                {
                    return Ok(Flow::Return(v));
                }
                if !ran {
                    return self.exec_block(else_body, env);
                }
            }
            NodeKind::Return { value } => return Ok(Flow::Return(self.eval(value, env)?)),
            NodeKind::ExprStatement { expr } => match &expr.kind {
                NodeKind::Match { value, clauses, else_body } => {
                    let subject = self.eval(value, env)?;
                    let body = self.choose_clause(&subject, clauses, else_body, env)?;
                    return self.exec_block(body, env);
                }
                _ => {
                    self.eval(expr, env)?;
                }
            },
            NodeKind::Function { name, params, guard, body } => {
                let shadows = self.annotations.has(node.id, AnnotationKey::FunctionShadow);
                let previous =
                    if guard.is_some() && shadows { env.get(name).cloned() } else { None };
                let closure = Closure {
                    name: Some(name.clone()),
                    params: params.clone(),
                    guard: guard.as_deref().cloned(),
                    body: Body::Block(body.clone()),
                    env: env.clone(),
                    previous,
                };
                env.insert(name.clone(), Val::Function(Rc::new(closure)));
            }
            NodeKind::Export { decl, items } => {
                let mut names: Vec<(String, String)> = items
                    .iter()
                    .map(|i| (i.name.clone(), i.visible_name().to_string()))
                    .collect();
                if let Some(decl) = decl {
                    self.exec(decl, env)?;
                    for name in crate::compiler::rewrite::declared_names(decl) {
                        names.push((name.clone(), name));
                    }
                }
                for (name, visible) in names {
                    let v = self.lookup(&name, env)?;
                    self.exports.push((visible, v));
                }
            }
            _ => return Err(EvalError::Unsupported(node.tag())),
        }
        Ok(Flow::Next)
    }

    /// Enumerate `ranges[level..]`, running `body` once per combination in
    /// a fresh copy of `outer` plus the range bindings. Names in `carried`
    /// are copied back into `outer` after each iteration.
    #[allow(clippy::too_many_arguments)]
    fn ranges(
        &mut self,
        ranges: &[Node],
        level: usize,
        outer: &mut Env,
        bound: &Env,
        carried: &[String],
        body: &[Node],
        ran: &mut bool,
    ) -> EvalResult<Flow> {
        let scope = |outer: &Env| {
            let mut s = outer.clone();
            s.extend(bound.iter().map(|(k, v)| (k.clone(), v.clone())));
            s
        };
        let Some(range) = ranges.get(level) else {
            *ran = true;
            let mut s = scope(outer);
            let flow = self.exec_block(body, &mut s)?;
            for name in carried {
                if let Some(v) = s.remove(name) {
                    outer.insert(name.clone(), v);
                }
            }
            return Ok(flow);
        };
        let NodeKind::Range { target, collection, guard } = &range.kind else {
            return Err(EvalError::Unsupported(range.tag()));
        };
        let items = iterate(self.eval(collection, &scope(outer))?)?;
        for item in items {
            let mut next = bound.clone();
            bind(target, Val::Data(item), &mut next);
            if let Some(guard) = guard {
                let mut s = outer.clone();
                s.extend(next.iter().map(|(k, v)| (k.clone(), v.clone())));
                if !self.eval(guard, &s)?.is_truthy() {
                    continue;
                }
            }
            if let Flow::Return(v) =
                self.ranges(ranges, level + 1, outer, &next, carried, body, ran)?
            {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Next)
    }

    fn choose_clause<'n>(
        &mut self,
        subject: &Val,
        clauses: &'n [Node],
        else_body: &'n [Node],
        env: &Env,
    ) -> EvalResult<&'n [Node]> {
        for clause in clauses {
            let NodeKind::MatchClause { patterns, body } = &clause.kind else {
                return Err(EvalError::Unsupported(clause.tag()));
            };
            for p in patterns {
                if self.pattern_matches(p, subject.clone(), env)? {
                    return Ok(body);
                }
            }
        }
        Ok(else_body)
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn eval(&mut self, node: &Node, env: &Env) -> EvalResult<Val> {
        match &node.kind {
            NodeKind::Literal { value } => Ok(Val::Data(value.clone())),
            NodeKind::Identifier { name } => self.lookup(name, env),
            NodeKind::Context => {
                let local = self
                    .annotations
                    .context_local(node.id)
                    .ok_or(EvalError::UnboundContext(node.id))?;
                Ok(self.locals.get(&local).cloned().unwrap_or(Val::Data(Value::Nothing)))
            }
            NodeKind::Unary { op, operand } => {
                let v = self.eval(operand, env)?;
                let result = match &v {
                    Val::Data(d) => apply_unary(*op, d).map(Val::Data),
                    _ if *op == UnaryOp::Not => Some(Val::Data(Value::Bool(false))),
                    _ => None,
                };
                result.ok_or_else(|| EvalError::Operator {
                    op: op.to_string(),
                    left: v.type_name(),
                    right: "nothing",
                })
            }
            NodeKind::Binary { op, left, right } => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                self.binary(*op, l, r)
            }
            NodeKind::And { left, right } => {
                let l = self.eval(left, env)?;
                if l.is_truthy() {
                    self.eval(right, env)
                } else {
                    Ok(l)
                }
            }
            NodeKind::Or { left, right } => {
                let l = self.eval(left, env)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval(right, env)
                }
            }
            NodeKind::Conditional { condition, consequent, alternative } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternative, env)
                }
            }
            NodeKind::Array { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for e in elements {
                    items.push(self.eval(e, env)?.into_data()?);
                }
                Ok(Val::Data(Value::Array(items)))
            }
            NodeKind::Object { entries } => {
                let mut out = Vec::with_capacity(entries.len());
                for entry in entries {
                    let NodeKind::Entry { key, value } = &entry.kind else {
                        return Err(EvalError::Unsupported(entry.tag()));
                    };
                    let key = match &key.kind {
                        NodeKind::Identifier { name } => name.clone(),
                        _ => property_key(&self.eval(key, env)?.into_data()?),
                    };
                    out.push((key, self.eval(value, env)?.into_data()?));
                }
                Ok(Val::Data(Value::Object(out)))
            }
            NodeKind::Member { object, property } => {
                let target = self.eval(object, env)?.into_data()?;
                let key = match &property.kind {
                    NodeKind::Identifier { name } => Value::String(name.clone()),
                    _ => self.eval(property, env)?.into_data()?,
                };
                Ok(Val::Data(member(&target, &key)))
            }
            NodeKind::Call { callee, args } => {
                if let (NodeKind::Pattern { .. }, [subject]) = (&callee.kind, args.as_slice()) {
                    let subject = self.eval(subject, env)?;
                    return Ok(Val::Data(Value::Bool(self.pattern_matches(callee, subject, env)?)));
                }
                let f = self.eval(callee, env)?;
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a, env)?);
                }
                self.call(f, values)
            }
            NodeKind::Lambda { params, body } => Ok(Val::Function(Rc::new(Closure {
                name: None,
                params: params.clone(),
                guard: None,
                body: Body::Expr((**body).clone()),
                env: env.clone(),
                previous: None,
            }))),
            NodeKind::Pattern { .. } => {
                Ok(Val::Pattern(Rc::new(PatternValue { node: node.clone(), env: env.clone() })))
            }
            NodeKind::Regex { pattern, flags } => Ok(Val::Regex(self.regex(pattern, flags)?)),
            NodeKind::Match { value, clauses, else_body } => {
                let subject = self.eval(value, env)?;
                let mut scope = env.clone();
                let body = self.choose_clause(&subject, clauses, else_body, &scope)?;
                self.block_value(body, &mut scope)
            }
            NodeKind::Reduce { accumulators, ranges, body } => {
                let mut scope = env.clone();
                let mut carried = Vec::new();
                for acc in accumulators {
                    self.exec(acc, &mut scope)?;
                    if let NodeKind::Assignment { target, .. } = &acc.kind {
                        carried.extend(target.names().into_iter().map(str::to_string));
                    }
                }
                let mut ran = false;
                let flow = self.ranges(ranges, 0, &mut scope, &Env::new(), &carried, body, &mut ran)?;
                match flow {
                    Flow::Return(v) => Ok(v),
                    Flow::Next => Ok(carried
                        .first()
                        .and_then(|name| scope.get(name).cloned())
                        .unwrap_or(Val::Data(Value::Nothing))),
                }
            }
            _ => Err(EvalError::Unsupported(node.tag())),
        }
    }

    /// The value of an expression-position branch: its trailing expression
    /// statement, or what it returns.
    fn block_value(&mut self, body: &[Node], env: &mut Env) -> EvalResult<Val> {
        let Some((last, init)) = body.split_last() else {
            return Ok(Val::Data(Value::Nothing));
        };
        if let Flow::Return(v) = self.exec_block(init, env)? {
            return Ok(v);
        }
        match &last.kind {
            NodeKind::ExprStatement { expr } => self.eval(expr, env),
            _ => match self.exec(last, env)? {
                Flow::Return(v) => Ok(v),
                Flow::Next => Ok(Val::Data(Value::Nothing)),
            },
        }
    }

    fn lookup(&self, name: &str, env: &Env) -> EvalResult<Val> {
        if let Some(v) = env.get(name) {
            return Ok(v.clone());
        }
        if let Some(native) = self.natives.get(name) {
            return Ok(Val::Native(native.clone()));
        }
        if builtins::type_predicate(name).is_some() {
            return Ok(Val::Type(name.to_string()));
        }
        Err(EvalError::Undefined(name.to_string()))
    }

    fn binary(&mut self, op: BinaryOp, l: Val, r: Val) -> EvalResult<Val> {
        if op == BinaryOp::Like {
            return Ok(Val::Data(Value::Bool(self.is_match(&r, l)?)));
        }
        let result = match (&l, &r) {
            (Val::Data(a), Val::Data(b)) => apply_binary(op, a, b).or_else(|| match op {
                // Collections compare by reference in the host.
                BinaryOp::Eq | BinaryOp::Neq => Some(Value::Bool(op == BinaryOp::Neq)),
                _ => None,
            }),
            _ => match op {
                BinaryOp::Eq => Some(Value::Bool(l == r)),
                BinaryOp::Neq => Some(Value::Bool(l != r)),
                _ => None,
            },
        };
        result.map(Val::Data).ok_or_else(|| EvalError::Operator {
            op: op.to_string(),
            left: l.type_name(),
            right: r.type_name(),
        })
    }

    pub fn call(&mut self, f: Val, args: Vec<Val>) -> EvalResult<Val> {
        match f {
            Val::Function(closure) => self.invoke(&closure, args),
            Val::Native(native) => (native.0)(&args),
            Val::Pattern(_) | Val::Regex(_) | Val::Type(_) => {
                let subject = args.into_iter().next().unwrap_or(Val::Data(Value::Nothing));
                Ok(Val::Data(Value::Bool(self.is_match(&f, subject)?)))
            }
            Val::Data(v) => Err(EvalError::NotCallable(v.type_name())),
        }
    }

    fn invoke(&mut self, closure: &Rc<Closure>, args: Vec<Val>) -> EvalResult<Val> {
        let mut env = closure.env.clone();
        if let Some(name) = &closure.name {
            env.insert(name.clone(), Val::Function(closure.clone()));
        }
        for (i, p) in closure.params.iter().enumerate() {
            let NodeKind::Param { name, variadic, .. } = &p.kind else {
                return Err(EvalError::Unsupported(p.tag()));
            };
            let v = if *variadic {
                let rest = args.iter().skip(i).cloned().map(Val::into_data);
                Val::Data(Value::Array(rest.collect::<EvalResult<Vec<_>>>()?))
            } else {
                args.get(i).cloned().unwrap_or(Val::Data(Value::Nothing))
            };
            env.insert(name.clone(), v);
        }
        if let Some(guard) = &closure.guard {
            if !self.eval(guard, &env)?.is_truthy() {
                return match &closure.previous {
                    Some(previous) => self.call(previous.clone(), args),
                    None => Err(EvalError::NoMatchingDefinition(
                        closure.name.clone().unwrap_or_default(),
                    )),
                };
            }
        }
        match &closure.body {
            Body::Expr(expr) => self.eval(expr, &env),
            Body::Block(body) => match self.exec_block(body, &mut env)? {
                Flow::Return(v) => Ok(v),
                Flow::Next => Ok(Val::Data(Value::Nothing)),
            },
        }
    }

    fn regex(&mut self, pattern: &str, flags: &str) -> EvalResult<Rc<Regex>> {
        let key = (pattern.to_string(), flags.to_string());
        if let Some(re) = self.regexes.get(&key) {
            return Ok(re.clone());
        }
        let re = Rc::new(
            RegexBuilder::new(pattern)
                .case_insensitive(flags.contains('i'))
                .multi_line(flags.contains('m'))
                .dot_matches_new_line(flags.contains('s'))
                .build()?,
        );
        self.regexes.insert(key, re.clone());
        Ok(re)
    }

    // ── Patterns ────────────────────────────────────────────────────

    /// Test `subject` against a pattern node or a bare template.
    fn pattern_matches(&mut self, node: &Node, subject: Val, env: &Env) -> EvalResult<bool> {
        let local =
            self.annotations.local(node.id).ok_or(EvalError::MissingPatternLocal(node.id))?;
        match &node.kind {
            NodeKind::Pattern { expr } => self.template_matches(expr, local, subject, env),
            _ => self.template_matches(node, local, subject, env),
        }
    }

    fn template_matches(
        &mut self,
        value: &Node,
        local: u32,
        subject: Val,
        env: &Env,
    ) -> EvalResult<bool> {
        let ann = self.annotations;
        match &value.kind {
            NodeKind::ObjectPattern { elements } | NodeKind::ArrayPattern { elements } => {
                let is_array = value.tag() == Tag::ArrayPattern;
                let parent = ann.parent_local(value.id).unwrap_or(local);
                self.locals.insert(parent, subject.clone());
                let data = match (&subject, is_array) {
                    (Val::Data(d @ Value::Array(items)), true) if items.len() == elements.len() => d,
                    (Val::Data(d @ Value::Object(_)), false) => d,
                    _ => return Ok(false),
                };
                for (i, element) in elements.iter().enumerate() {
                    let NodeKind::PatternElement { key, value } = &element.kind else {
                        return Err(EvalError::Unsupported(element.tag()));
                    };
                    let key = match key.as_deref() {
                        None => Value::Number(i as f64),
                        Some(Node { kind: NodeKind::Identifier { name }, .. }) => {
                            Value::String(name.clone())
                        }
                        Some(k) => self.eval(k, env)?.into_data()?,
                    };
                    let child = Val::Data(member(data, &key));
                    let element_local = ann
                        .local(element.id)
                        .ok_or(EvalError::MissingPatternLocal(element.id))?;
                    if !self.template_matches(value, element_local, child, env)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ if value.tag() == Tag::Context || ann.has(value.id, AnnotationKey::PatternContext) => {
                self.locals.insert(local, subject);
                Ok(self.eval(value, env)?.is_truthy())
            }
            NodeKind::Identifier { name }
                if !env.contains_key(name) && builtins::type_predicate(name).is_some() =>
            {
                Ok(check_type(name, &subject))
            }
            NodeKind::Literal { value: lit }
                if lit.is_primitive() && ann.has(value.id, AnnotationKey::PatternEquality) =>
            {
                Ok(matches!(&subject, Val::Data(d) if strict_equals(d, lit) == Some(true)))
            }
            _ => {
                let matcher = self.eval(value, env)?;
                self.is_match(&matcher, subject)
            }
        }
    }

    /// The runtime's structural match of `subject` against `matcher`.
    fn is_match(&mut self, matcher: &Val, subject: Val) -> EvalResult<bool> {
        match matcher {
            Val::Pattern(p) => {
                let p = p.clone();
                self.pattern_matches(&p.node, subject, &p.env)
            }
            Val::Regex(re) => {
                Ok(matches!(&subject, Val::Data(Value::String(s)) if re.is_match(s)))
            }
            Val::Type(name) => Ok(check_type(name, &subject)),
            Val::Function(_) | Val::Native(_) => {
                Ok(self.call(matcher.clone(), vec![subject])?.is_truthy())
            }
            Val::Data(m) => match (m, &subject) {
                (Value::Array(ms), Val::Data(Value::Array(ss))) => {
                    if ms.len() != ss.len() {
                        return Ok(false);
                    }
                    for (m, s) in ms.iter().zip(ss) {
                        if !self.is_match(&Val::Data(m.clone()), Val::Data(s.clone()))? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                (Value::Object(ms), Val::Data(s @ Value::Object(_))) => {
                    for (k, m) in ms {
                        let child = s.get(k).cloned().unwrap_or(Value::Nothing);
                        if !self.is_match(&Val::Data(m.clone()), Val::Data(child))? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                (m, Val::Data(s)) => Ok(strict_equals(m, s) == Some(true)),
                _ => Ok(false),
            },
        }
    }
}

fn check_type(name: &str, subject: &Val) -> bool {
    match subject {
        Val::Data(d) => builtins::check_type(name, d).unwrap_or(false),
        Val::Function(_) | Val::Native(_) => matches!(name, "Any" | "Function"),
        _ => name == "Any",
    }
}

fn bind(target: &Target, v: Val, env: &mut Env) {
    match target {
        Target::Name(name) => {
            env.insert(name.clone(), v);
        }
        Target::Array(names) => {
            for (i, name) in names.iter().enumerate() {
                let item = match &v {
                    Val::Data(Value::Array(items)) => items.get(i).cloned(),
                    _ => None,
                };
                env.insert(name.clone(), Val::Data(item.unwrap_or(Value::Nothing)));
            }
        }
        Target::Object(pairs) => {
            for (key, name) in pairs {
                let item = match &v {
                    Val::Data(d) => d.get(key).cloned(),
                    _ => None,
                };
                env.insert(name.clone(), Val::Data(item.unwrap_or(Value::Nothing)));
            }
        }
    }
}

/// Arrays iterate their items; objects iterate `[key, value]` pairs.
fn iterate(collection: Val) -> EvalResult<Vec<Value>> {
    match collection {
        Val::Data(Value::Array(items)) => Ok(items),
        Val::Data(Value::Object(entries)) => Ok(entries
            .into_iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
            .collect()),
        other => Err(EvalError::NotIterable(other.type_name())),
    }
}

fn property_key(key: &Value) -> String {
    key.to_host_string().unwrap_or_default()
}

fn member(target: &Value, key: &Value) -> Value {
    match (target, key) {
        (Value::Array(items), Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
            items.get(*n as usize).cloned().unwrap_or(Value::Nothing)
        }
        (Value::Array(items), Value::String(k)) if k == "length" => {
            Value::Number(items.len() as f64)
        }
        (Value::String(s), Value::String(k)) if k == "length" => {
            Value::Number(s.chars().count() as f64)
        }
        (Value::Object(_), _) => target.get(&property_key(key)).cloned().unwrap_or(Value::Nothing),
        _ => Value::Nothing,
    }
}
