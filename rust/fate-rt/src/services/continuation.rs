//! Settle-once continuations.
//!
//! A [`Continuation`] is resolved or rejected at most once. Every callback
//! registered with [`Continuation::on_settled`] is handed to the scheduler
//! in registration order, whether it was registered before or after the
//! continuation settled.

use crate::services::scheduler::Scheduler;
use crate::{Outcome, RuntimeError, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Callback = Box<dyn FnOnce(Outcome)>;

#[derive(Default)]
struct State {
    outcome: Option<Outcome>,
    callbacks: Vec<Callback>,
}

#[derive(Clone)]
pub struct Continuation {
    state: Rc<RefCell<State>>,
    scheduler: Scheduler,
}

impl Continuation {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self { state: Rc::default(), scheduler: scheduler.clone() }
    }

    /// A continuation already resolved with `value`.
    pub fn resolved(scheduler: &Scheduler, value: Value) -> Self {
        let c = Self::new(scheduler);
        c.state.borrow_mut().outcome = Some(Ok(value));
        c
    }

    pub fn resolve(&self, value: Value) -> Result<(), RuntimeError> {
        self.settle(Ok(value))
    }

    pub fn reject(&self, reason: impl Into<String>) -> Result<(), RuntimeError> {
        self.settle(Err(RuntimeError::Rejected(reason.into())))
    }

    /// Settle with `outcome`. A second settle fails and leaves the first
    /// outcome in place.
    pub fn settle(&self, outcome: Outcome) -> Result<(), RuntimeError> {
        let callbacks = {
            let mut state = self.state.borrow_mut();
            if state.outcome.is_some() {
                return Err(RuntimeError::AlreadySettled);
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.callbacks)
        };
        tracing::trace!(ok = outcome.is_ok(), callbacks = callbacks.len(), "continuation settled");
        for callback in callbacks {
            self.notify(callback, outcome.clone());
        }
        Ok(())
    }

    /// Register `callback` to receive the outcome.
    pub fn on_settled(&self, callback: impl FnOnce(Outcome) + 'static) {
        let settled = self.state.borrow().outcome.clone();
        match settled {
            Some(outcome) => self.notify(Box::new(callback), outcome),
            None => self.state.borrow_mut().callbacks.push(Box::new(callback)),
        }
    }

    fn notify(&self, callback: Callback, outcome: Outcome) {
        self.scheduler.enqueue(move || callback(outcome));
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state.borrow().outcome.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().outcome.is_some()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Continuation")
            .field("outcome", &state.outcome)
            .field("waiting", &state.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce(Outcome)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: &str| -> Box<dyn FnOnce(Outcome)> {
            let (sink, tag) = (sink.clone(), tag.to_string());
            Box::new(move |o: Outcome| sink.borrow_mut().push(format!("{}:{:?}", tag, o)))
        };
        (log, make)
    }

    #[test]
    fn settles_at_most_once() {
        let sched = Scheduler::new();
        let c = Continuation::new(&sched);
        assert!(!c.is_settled());
        c.resolve(Value::from(1)).unwrap();
        assert_eq!(c.reject("late"), Err(RuntimeError::AlreadySettled));
        assert_eq!(c.resolve(Value::from(2)), Err(RuntimeError::AlreadySettled));
        assert_eq!(c.outcome(), Some(Ok(Value::from(1))));
    }

    #[test]
    fn callbacks_fire_in_registration_order_including_late_ones() {
        let sched = Scheduler::new();
        let c = Continuation::new(&sched);
        let (log, make) = recorder();
        c.on_settled(make("a"));
        c.on_settled(make("b"));
        c.resolve(Value::from("v")).unwrap();
        c.on_settled(make("c"));
        assert!(log.borrow().is_empty());
        sched.run_until_idle();
        assert_eq!(
            *log.borrow(),
            vec![
                "a:Ok(String(\"v\"))".to_string(),
                "b:Ok(String(\"v\"))".to_string(),
                "c:Ok(String(\"v\"))".to_string(),
            ]
        );
    }

    #[test]
    fn rejection_reaches_callbacks() {
        let sched = Scheduler::new();
        let c = Continuation::new(&sched);
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        c.on_settled(move |o| *sink.borrow_mut() = Some(o));
        c.reject("boom").unwrap();
        sched.run_until_idle();
        assert_eq!(*seen.borrow(), Some(Err(RuntimeError::Rejected("boom".into()))));
    }
}
