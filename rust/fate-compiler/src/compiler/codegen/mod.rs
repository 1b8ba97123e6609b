//! JavaScript code generation.
//!
//! Linearizes a validated tree into the body of one callable module:
//!
//! ```text
//! (function ($r) {
//!   "use strict";
//!   const $isTrue = $r.isTrue;     // runtime imports
//!   const $l0 = [1, 2, 3];         // hoisted literals
//!   const $b0 = $r.defineRegex("a+", "g"); // cached builders
//!   return function ($c, $x) {
//!     let x, x$1;                  // hoisted ids
//!     ...
//!   };
//! })
//! ```
//!
//! Locals are versioned per write (see [`names`]); branches are generated
//! against private name tables and merged with trailing assignments.

mod expr;
pub mod globals;
pub mod names;
mod pattern;
mod stmt;
pub mod writer;

use crate::compiler::annotations::Annotations;
use crate::compiler::ast::{Node, NodeId, NodeKind, Tag};
use crate::config::CompileOptions;
use globals::Globals;
use names::{IdAllocator, NameTable};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use writer::CodeBuf;

#[derive(Debug, Error, PartialEq)]
pub enum CodegenError {
    #[error("context reference {0:?} has no owning pattern local")]
    UnboundContext(NodeId),
    #[error("pattern node {0:?} has no local")]
    MissingPatternLocal(NodeId),
    #[error("'{tag}' cannot appear in {position} position")]
    Unexpected { tag: Tag, position: &'static str },
    #[error("module root must be a module, found '{0}'")]
    NotAModule(Tag),
}

pub type Result<T> = std::result::Result<T, CodegenError>;

/// Output of code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    /// The module function expression.
    pub text: String,
    /// Hex SHA-256 of `text`.
    pub hash: String,
    /// Runtime library functions the module references, in first-use order.
    pub imports: Vec<String>,
}

/// One hoisting scope: a generated JavaScript function.
#[derive(Debug, Default)]
struct Frame {
    hoisted: Vec<String>,
    hoisted_set: HashSet<String>,
    params: HashSet<String>,
    generator: bool,
    result_slot: bool,
}

pub struct Generator<'a> {
    options: &'a CompileOptions,
    annotations: &'a Annotations,
    globals: Globals,
    ids: IdAllocator,
    names: NameTable,
    frames: Vec<Frame>,
}

pub fn generate(
    root: &Node,
    annotations: &Annotations,
    options: &CompileOptions,
) -> Result<GeneratedModule> {
    let NodeKind::Module { body } = &root.kind else {
        return Err(CodegenError::NotAModule(root.tag()));
    };
    let mut gen = Generator::new(options, annotations);
    gen.frames.push(Frame::default());
    let mut code = gen.statements(body)?;
    let frame = gen.pop_frame();
    let module_fn = gen.function_body("function ($c, $x)", frame, &mut code);

    let mut outer = CodeBuf::new();
    if options.strict_mode {
        outer.line("\"use strict\";");
    }
    outer.append(gen.globals.render());
    outer.line(format!("return {};", module_fn));
    let text = writer::function_text("(function ($r)", &outer, options.indent) + ")";

    let hash = format!("{:x}", Sha256::digest(text.as_bytes()));
    tracing::debug!(bytes = text.len(), %hash, "generated module");
    Ok(GeneratedModule { text, hash, imports: gen.globals.imports().to_vec() })
}

impl<'a> Generator<'a> {
    fn new(options: &'a CompileOptions, annotations: &'a Annotations) -> Self {
        Self {
            options,
            annotations,
            globals: Globals::new(),
            ids: IdAllocator::default(),
            names: NameTable::new(),
            frames: Vec::new(),
        }
    }

    // ── Frames ──────────────────────────────────────────────────────

    fn frame(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().unwrap_or_default()
    }

    fn in_generator(&self) -> bool {
        self.frames.last().is_some_and(|f| f.generator)
    }

    fn hoist(&mut self, id: &str) {
        let frame = self.frame();
        if !frame.params.contains(id) && frame.hoisted_set.insert(id.to_string()) {
            frame.hoisted.push(id.to_string());
        }
    }

    /// Render a function: hoisted `let` list, then `body`, then the
    /// result-slot return when the single-result idiom was used.
    fn function_body(&self, head: &str, frame: Frame, body: &mut CodeBuf) -> String {
        let mut code = CodeBuf::new();
        let mut hoisted = frame.hoisted;
        if frame.result_slot {
            hoisted.push("$v".to_string());
        }
        if !hoisted.is_empty() {
            code.line(format!("let {};", hoisted.join(", ")));
        }
        code.append(std::mem::take(body));
        if frame.result_slot {
            code.line("return $v;");
        }
        writer::function_text(head, &code, self.options.indent)
    }

    // ── Names ───────────────────────────────────────────────────────

    /// Current id of `name`, allocating a hoisted one if it has none.
    fn read(&mut self, name: &str) -> String {
        if let Some(id) = self.names.current(name) {
            return id.to_string();
        }
        let id = self.ids.version(name);
        self.hoist(&id);
        self.names.push(name, id.clone());
        id
    }

    /// Allocate a new version of `name`.
    fn write(&mut self, name: &str) -> String {
        let id = self.ids.version(name);
        self.hoist(&id);
        self.names.push(name, id.clone());
        id
    }

    /// Allocate a parameter id in the current frame; parameters are not
    /// hoisted.
    fn write_param(&mut self, name: &str) -> String {
        let id = self.ids.version(name);
        self.frame().params.insert(id.clone());
        self.names.push(name, id.clone());
        id
    }

    fn temp(&mut self) -> String {
        let id = self.ids.temp();
        self.hoist(&id);
        id
    }

    fn runtime(&mut self, name: &str) -> String {
        self.globals.import(name)
    }

    /// A name with no version that is a configured host global.
    fn host_global(&self, name: &str) -> bool {
        self.names.current(name).is_none() && self.options.globals.iter().any(|g| g == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Tree;
    use crate::compiler::build::*;
    use super::generate;

    #[test]
    fn empty_module_shape() {
        let tree = Tree::new(vec![]);
        let out = generate(&tree.root, &Annotations::new(), &CompileOptions::default()).unwrap();
        assert_eq!(
            out.text,
            "(function ($r) {\n  \"use strict\";\n  return function ($c, $x) {};\n})"
        );
        assert_eq!(out.hash.len(), 64);
        assert!(out.imports.is_empty());
    }

    #[test]
    fn non_module_root_is_rejected() {
        let err = generate(&num(1.0), &Annotations::new(), &CompileOptions::default()).unwrap_err();
        assert_eq!(err, CodegenError::NotAModule(Tag::Literal));
    }
}
