//! Fate Compiler
//!
//! Turns a Fate parse tree into the body of a JavaScript module: pattern
//! elaboration, rewriting, scope validation, then code generation.

pub mod compiler;
pub mod config;
pub mod diagnostics;

use compiler::annotations::Annotations;
use compiler::ast::Tree;
use compiler::codegen::{CodegenError, GeneratedModule};
use compiler::pipeline::{run_passes, PassKind};
use config::ConfigError;
use diagnostics::Diagnostic;
use thiserror::Error;

pub use compiler::interp::{EvalError, Interpreter, Val};
pub use config::CompileOptions;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation failed with {} error(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    #[error("internal error in {pass} pass: {message}")]
    Internal { pass: PassKind, message: String },
    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("malformed tree: {0}")]
    Tree(#[from] serde_json::Error),
}

/// Result of a successful compile.
#[derive(Debug)]
pub struct Compiled {
    pub module: GeneratedModule,
    /// Warnings in the order they were reported.
    pub warnings: Vec<Diagnostic>,
    /// The transformed tree the module was generated from.
    pub tree: Tree,
    pub annotations: Annotations,
}

/// Compile `tree` with the passes configured in `options`.
pub fn compile(tree: Tree, options: &CompileOptions) -> Result<Compiled, CompileError> {
    compile_with_passes(tree, &options.passes, options)
}

/// Compile a tree given as JSON.
pub fn compile_json(json: &str, options: &CompileOptions) -> Result<Compiled, CompileError> {
    compile(Tree::from_json(json)?, options)
}

/// Run `passes` in order, then generate code. Any error diagnostic stops
/// the compile before code generation; warnings never do.
pub fn compile_with_passes(
    tree: Tree,
    passes: &[PassKind],
    options: &CompileOptions,
) -> Result<Compiled, CompileError> {
    let (tree, session) = run_passes(tree, passes, options)
        .map_err(|e| CompileError::Internal { pass: e.pass, message: e.message })?;

    let (errors, warnings): (Vec<Diagnostic>, Vec<Diagnostic>) =
        session.diagnostics.into_iter().partition(Diagnostic::is_error);
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "compile stopped before code generation");
        return Err(CompileError::Diagnostics(errors));
    }

    let module = compiler::codegen::generate(&tree.root, &session.annotations, options)?;
    tracing::info!(
        hash = %module.hash,
        imports = module.imports.len(),
        warnings = warnings.len(),
        "compiled module"
    );
    Ok(Compiled { module, warnings, tree, annotations: session.annotations })
}
