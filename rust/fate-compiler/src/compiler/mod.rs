pub mod annotations;
pub mod ast;
pub mod build;
pub mod builtins;
pub mod codegen;
pub mod interp;
pub mod pattern;
pub mod pipeline;
pub mod rewrite;
pub mod span;
pub mod traverse;
pub mod validate;
