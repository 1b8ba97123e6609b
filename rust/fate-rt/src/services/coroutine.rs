//! Coroutine driver for `do` and `generate` blocks.
//!
//! A generated block is a generator function; natively it is a
//! [`Coroutine`] resumed with the outcome of whatever it last waited on.
//! The driver resumes it until it completes, fails, or suspends; a suspended
//! coroutine resumes from the scheduler once its await settles. There is no
//! way to cancel a suspended coroutine.

use crate::services::awaitables::{resolve, Suspend};
use crate::services::continuation::Continuation;
use crate::services::scheduler::Scheduler;
use crate::{Outcome, RuntimeError, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// What a coroutine did when resumed.
#[derive(Debug, Clone)]
pub enum Step {
    Suspend(Suspend),
    Emit(Value),
    Complete(Value),
    Fail(String),
}

pub trait Coroutine {
    /// Run to the next yield point. The first resume receives `Ok(Nothing)`;
    /// later ones receive the outcome of the preceding suspend or emit.
    fn resume(&mut self, input: Outcome) -> Step;
}

impl<F: FnMut(Outcome) -> Step> Coroutine for F {
    fn resume(&mut self, input: Outcome) -> Step {
        self(input)
    }
}

type Sink = Box<dyn FnMut(Value)>;

struct Driver {
    coroutine: Box<dyn Coroutine>,
    sink: Option<Sink>,
    done: Continuation,
}

/// Start a `do` block; the returned continuation settles with its result.
pub fn spawn_do_block(scheduler: &Scheduler, coroutine: impl Coroutine + 'static) -> Continuation {
    spawn(scheduler, Box::new(coroutine), None)
}

/// Start a `generate` block, handing each emitted value to `sink` in
/// order. The returned continuation settles when the block completes.
pub fn spawn_generator(
    scheduler: &Scheduler,
    coroutine: impl Coroutine + 'static,
    sink: impl FnMut(Value) + 'static,
) -> Continuation {
    spawn(scheduler, Box::new(coroutine), Some(Box::new(sink)))
}

fn spawn(scheduler: &Scheduler, coroutine: Box<dyn Coroutine>, sink: Option<Sink>) -> Continuation {
    let done = Continuation::new(scheduler);
    let driver = Rc::new(RefCell::new(Driver { coroutine, sink, done: done.clone() }));
    let sched = scheduler.clone();
    scheduler.enqueue(move || drive(&sched, driver, Ok(Value::Nothing)));
    done
}

fn drive(scheduler: &Scheduler, driver: Rc<RefCell<Driver>>, mut input: Outcome) {
    let (outcome, done) = loop {
        let step = driver.borrow_mut().coroutine.resume(input);
        match step {
            Step::Suspend(suspend) => {
                let awaited = resolve(scheduler, suspend);
                let sched = scheduler.clone();
                awaited.on_settled(move |outcome| drive(&sched, driver, outcome));
                return;
            }
            Step::Emit(value) => {
                let mut d = driver.borrow_mut();
                if let Some(sink) = d.sink.as_mut() {
                    sink(value);
                    input = Ok(Value::Nothing);
                    continue;
                }
                let failed = RuntimeError::CoroutineFailed("emit outside a generate block".into());
                break (Err(failed), d.done.clone());
            }
            Step::Complete(value) => break (Ok(value), driver.borrow().done.clone()),
            Step::Fail(message) => {
                break (Err(RuntimeError::CoroutineFailed(message)), driver.borrow().done.clone())
            }
        }
    };
    tracing::trace!(ok = outcome.is_ok(), "coroutine finished");
    if done.settle(outcome).is_err() {
        tracing::trace!("coroutine settled twice");
    }
}
