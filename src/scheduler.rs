// Copyright 2025 Cowboy AI, LLC.

//! Deferred task execution for merged listeners
//!
//! [`ManualScheduler`] keeps a virtual clock that tests advance explicitly.
//! [`TokioScheduler`] spawns onto the current `LocalSet`, which matches the
//! single-threaded object graph.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::trace;

/// Deferred unit of work
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks after a delay
pub trait Scheduler {
    /// Run `task` once `delay` has elapsed
    fn schedule(&self, delay: Duration, task: Task);
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    queue: BTreeMap<(Duration, u64), Task>,
}

/// Scheduler driven by an explicit virtual clock
#[derive(Default)]
pub struct ManualScheduler {
    state: RefCell<ManualState>,
}

impl ManualScheduler {
    /// Scheduler at virtual time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of tasks waiting
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Move the clock forward by `by`, running every task that falls due in
    /// deadline order. Tasks scheduled by running tasks are honoured if they
    /// fall inside the window. Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.borrow().now + by;
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let due = state
                    .queue
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(at, _)| *at <= target);
                match due {
                    Some(key) => {
                        state.now = key.0;
                        state.queue.remove(&key)
                    }
                    None => None,
                }
            };
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        self.state.borrow_mut().now = target;
        trace!(ran, "manual scheduler advanced");
        ran
    }

    /// Run everything queued regardless of deadline
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let last = self.state.borrow().queue.last_key_value().map(|(key, _)| key.0);
            match last {
                Some(at) => {
                    let now = self.now();
                    ran += self.advance(at.saturating_sub(now));
                }
                None => return ran,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut state = self.state.borrow_mut();
        let key = (state.now + delay, state.seq);
        state.seq += 1;
        state.queue.insert(key, task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

/// Scheduler backed by `tokio::task::spawn_local` and `tokio::time::sleep`.
///
/// Must be used from within a `tokio::task::LocalSet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
