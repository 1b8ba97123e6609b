//! Runtime services: queueing, scheduling, continuations, and coroutine
//! driving.

pub mod awaitables;
pub mod continuation;
pub mod coroutine;
pub mod queue;
pub mod scheduler;
