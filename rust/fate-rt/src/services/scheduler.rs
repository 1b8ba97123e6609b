//! Cooperative single-threaded scheduler.
//!
//! A [`Scheduler`] is a cheaply clonable handle to one task queue. Tasks
//! enqueued from inside a running task land at the back of the queue and run
//! on a later tick; nothing ever runs re-entrantly from inside
//! [`Scheduler::enqueue`].
//!
//! # Scheduling algorithm (per tick)
//!
//! 1. Take up to `batch_size` tasks from the front of the queue.
//! 2. Run them in order, without holding the queue borrow.
//! 3. Return a [`TickResult`] indicating whether work was performed.

use crate::services::queue::WorkQueue;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A unit of scheduled work.
pub type Task = Box<dyn FnOnce()>;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Outcome of a single [`Scheduler::tick`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// At least one task was executed during this tick.
    Progress,
    /// The queue was empty.
    Idle,
}

struct State {
    queue: WorkQueue<Task>,
    batch_size: usize,
    completed: usize,
}

#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<State>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    /// A scheduler running at most `batch_size` tasks per tick (minimum 1).
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                queue: WorkQueue::new(),
                batch_size: batch_size.max(1),
                completed: 0,
            })),
        }
    }

    pub fn enqueue(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().queue.push(Box::new(task));
    }

    /// Run one batch of queued tasks.
    pub fn tick(&self) -> TickResult {
        let batch = {
            let mut state = self.state.borrow_mut();
            let size = state.batch_size;
            state.queue.drain_batch(size)
        };
        if batch.is_empty() {
            return TickResult::Idle;
        }
        let ran = batch.len();
        for task in batch {
            task();
        }
        let mut state = self.state.borrow_mut();
        state.completed += ran;
        tracing::trace!(ran, pending = state.queue.len(), "scheduler tick");
        TickResult::Progress
    }

    /// Tick until the queue is empty; returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let before = self.completed_count();
        while self.tick() == TickResult::Progress {}
        self.completed_count() - before
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Total number of tasks run by this scheduler.
    pub fn completed_count(&self) -> usize {
        self.state.borrow().completed
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("pending", &state.queue.len())
            .field("batch_size", &state.batch_size)
            .field("completed", &state.completed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn tick_returns_idle_when_no_work() {
        let sched = Scheduler::new();
        assert_eq!(sched.tick(), TickResult::Idle);
        assert_eq!(sched.run_until_idle(), 0);
    }

    #[test]
    fn tasks_run_in_enqueue_order() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            sched.enqueue(move || log.borrow_mut().push(i));
        }
        assert_eq!(sched.pending(), 5);
        assert_eq!(sched.run_until_idle(), 5);
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn enqueue_from_a_task_runs_on_a_later_tick() {
        let sched = Scheduler::new();
        let ran = Rc::new(Cell::new(0));
        let (inner_sched, inner_ran) = (sched.clone(), ran.clone());
        sched.enqueue(move || {
            inner_ran.set(inner_ran.get() + 1);
            let again = inner_ran.clone();
            inner_sched.enqueue(move || again.set(again.get() + 10));
        });
        assert_eq!(sched.tick(), TickResult::Progress);
        assert_eq!(ran.get(), 1);
        assert_eq!(sched.pending(), 1);
        sched.tick();
        assert_eq!(ran.get(), 11);
    }

    #[test]
    fn batch_size_bounds_each_tick() {
        let sched = Scheduler::with_batch_size(2);
        for _ in 0..5 {
            sched.enqueue(|| {});
        }
        sched.tick();
        assert_eq!(sched.pending(), 3);
        assert_eq!(sched.completed_count(), 2);
        let dbg = format!("{:?}", sched);
        assert!(dbg.contains("batch_size: 2"), "{}", dbg);
    }
}
