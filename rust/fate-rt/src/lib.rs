//! Fate Runtime
//!
//! The concurrency substrate generated modules call into: a cooperative
//! single-threaded scheduler, settle-once continuations, the await
//! resolvers, and the driver that runs `do` and `generate` blocks as
//! coroutines.

pub mod services;

use thiserror::Error;

pub use fate_core::Value;
pub use services::awaitables::{
    await_all, await_any, await_value, resolve, resolve_all, resolve_any, resolve_value, AwaitMode,
    Awaitable, Suspend,
};
pub use services::continuation::Continuation;
pub use services::coroutine::{spawn_do_block, spawn_generator, Coroutine, Step};
pub use services::queue::WorkQueue;
pub use services::scheduler::{Scheduler, TickResult};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("continuation already settled")]
    AlreadySettled,
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("coroutine failed: {0}")]
    CoroutineFailed(String),
}

/// The settled state of a continuation.
pub type Outcome = Result<Value, RuntimeError>;
