//! Fate Core
//!
//! Shared value model and host operator semantics used by the compiler's
//! folding pass, its reference interpreter, and the runtime substrate.

pub mod ops;
pub mod values;

pub use ops::{BinaryOp, UnaryOp};
pub use values::Value;
