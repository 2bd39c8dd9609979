//! Mutex + condition variable pair guarding a piece of state

use std::sync::{Condvar, Mutex, PoisonError};

/// Monitor over `T`.
///
/// The state is only reachable through closures run under the lock, so callers
/// cannot observe or change it outside a wait or a signal.
#[derive(Debug, Default)]
pub struct Monitor<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> Monitor<T> {
    pub fn new(state: T) -> Self {
        Self { state: Mutex::new(state), cond: Condvar::new() }
    }

    /// Block until `ready` holds, then run `then` without releasing the lock.
    ///
    /// Spurious wake-ups re-check `ready`.
    pub fn wait_then<R>(&self, mut ready: impl FnMut(&T) -> bool, then: impl FnOnce(&mut T) -> R) -> R {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self
            .cond
            .wait_while(guard, |state| !ready(state))
            .unwrap_or_else(PoisonError::into_inner);
        then(&mut guard)
    }

    /// Mutate the state and wake every waiter.
    pub fn notify_all<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        let result = {
            let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut guard)
        };
        self.cond.notify_all();
        result
    }

    /// Run `f` under the lock without waking anyone.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
