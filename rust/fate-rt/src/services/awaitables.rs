//! Await records and resolvers.
//!
//! Generated code suspends on a [`Suspend`] built by `await_value`,
//! `await_any` or `await_all`. The driver hands it to [`resolve`], which
//! folds the awaited [`Awaitable`] into a single continuation:
//!
//! * value: settles with the awaited value;
//! * all: settles with an array once every element has settled, in element
//!   order, or rejects with the first rejection;
//! * any: settles with the first element to settle; later settlements are
//!   dropped.

use crate::services::continuation::Continuation;
use crate::services::scheduler::Scheduler;
use crate::{RuntimeError, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Something generated code can await.
#[derive(Debug, Clone)]
pub enum Awaitable {
    Ready(Value),
    Pending(Continuation),
    Many(Vec<Awaitable>),
}

impl From<Value> for Awaitable {
    fn from(value: Value) -> Self {
        Awaitable::Ready(value)
    }
}

impl From<Continuation> for Awaitable {
    fn from(c: Continuation) -> Self {
        Awaitable::Pending(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitMode {
    Value,
    Any,
    All,
}

/// A coroutine's request to pause until `value` settles.
#[derive(Debug, Clone)]
pub struct Suspend {
    pub mode: AwaitMode,
    pub value: Awaitable,
}

pub fn await_value(value: impl Into<Awaitable>) -> Suspend {
    Suspend { mode: AwaitMode::Value, value: value.into() }
}

pub fn await_any(value: impl Into<Awaitable>) -> Suspend {
    Suspend { mode: AwaitMode::Any, value: value.into() }
}

pub fn await_all(value: impl Into<Awaitable>) -> Suspend {
    Suspend { mode: AwaitMode::All, value: value.into() }
}

/// The continuation a suspended coroutine resumes from.
pub fn resolve(scheduler: &Scheduler, suspend: Suspend) -> Continuation {
    match suspend.mode {
        AwaitMode::Value => resolve_value(scheduler, suspend.value),
        AwaitMode::Any => resolve_any(scheduler, suspend.value),
        AwaitMode::All => resolve_all(scheduler, suspend.value),
    }
}

/// A collection awaited as a plain value settles like `all`.
pub fn resolve_value(scheduler: &Scheduler, value: Awaitable) -> Continuation {
    match value {
        Awaitable::Ready(v) => Continuation::resolved(scheduler, v),
        Awaitable::Pending(c) => c,
        many @ Awaitable::Many(_) => resolve_all(scheduler, many),
    }
}

pub fn resolve_all(scheduler: &Scheduler, value: Awaitable) -> Continuation {
    let items = match value {
        Awaitable::Many(items) => items,
        single => return resolve_value(scheduler, single),
    };
    let out = Continuation::new(scheduler);
    if items.is_empty() {
        let _ = out.resolve(Value::Array(Vec::new()));
        return out;
    }

    let slots = Rc::new(RefCell::new(vec![None; items.len()]));
    let remaining = Rc::new(RefCell::new(items.len()));
    for (i, item) in items.into_iter().enumerate() {
        let (out, slots, remaining) = (out.clone(), slots.clone(), remaining.clone());
        resolve_value(scheduler, item).on_settled(move |outcome| match outcome {
            Ok(v) => {
                slots.borrow_mut()[i] = Some(v);
                let mut left = remaining.borrow_mut();
                *left -= 1;
                if *left == 0 {
                    let values = slots.borrow_mut().drain(..).map(|v| v.unwrap_or(Value::Nothing)).collect();
                    let _ = out.resolve(Value::Array(values));
                }
            }
            Err(err) => {
                if out.settle(Err(err)).is_err() {
                    tracing::trace!(index = i, "rejection after await-all settled");
                }
            }
        });
    }
    out
}

/// An empty collection rejects: nothing could ever settle it.
pub fn resolve_any(scheduler: &Scheduler, value: Awaitable) -> Continuation {
    let items = match value {
        Awaitable::Many(items) => items,
        single => return resolve_value(scheduler, single),
    };
    let out = Continuation::new(scheduler);
    if items.is_empty() {
        let _ = out.settle(Err(RuntimeError::Rejected("await any of an empty collection".into())));
        return out;
    }
    for (i, item) in items.into_iter().enumerate() {
        let out = out.clone();
        resolve_value(scheduler, item).on_settled(move |outcome| {
            if out.settle(outcome).is_err() {
                tracing::trace!(index = i, "late settlement ignored by await-any");
            }
        });
    }
    out
}
