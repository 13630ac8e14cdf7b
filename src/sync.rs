//! Bounded-wait locking for state shared between tasks.
//!
//! The heater session and the alert scheduler are touched from the
//! controller task, the heater task and the alert task.  Callers on the
//! UI side must never stall behind a long critical section, so they use
//! [`TimedLock::lock_within`], which gives up after a deadline and lets
//! the caller drop the request.  The heater compute path uses the
//! unbounded [`TimedLock::lock`].
//!
//! A poisoned mutex is recovered rather than propagated: the guarded
//! state is plain data and every writer leaves it consistent.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use crate::error::LockTimeout;

/// `std::sync::Mutex` with a bounded acquisition path.
pub struct TimedLock<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> TimedLock<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    /// Block until the lock is free.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Try to acquire the lock, waiting at most `timeout`.
    pub fn lock_within(&self, timeout: Duration) -> Result<MutexGuard<'_, T>, LockTimeout> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(p)) => return Ok(p.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(LockTimeout(self.name));
                    }
                    std::thread::yield_now();
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
