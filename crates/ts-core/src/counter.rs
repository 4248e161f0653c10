//! The driver's crossing priority counter.
//!
//! Nodes update counters of the vehicles registered at them while node
//! updates run on several worker threads, so the value sits behind a mutex.
//! Every access takes a scoped guard; the guard is released on every exit
//! path, including the error path of a checked increment.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{CoreError, CoreResult};

/// Mutex-guarded `i32` that refuses to wrap.
#[derive(Debug, Default)]
pub struct PriorityCounter {
    value: Mutex<i32>,
}

impl PriorityCounter {
    pub fn new() -> Self {
        Self { value: Mutex::new(0) }
    }

    fn guard(&self) -> MutexGuard<'_, i32> {
        // A panicking holder cannot leave the integer half-written.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value.
    pub fn get(&self) -> i32 {
        *self.guard()
    }

    /// Add one; fails with [`CoreError::CounterOverflow`] instead of wrapping.
    pub fn increment(&self) -> CoreResult<i32> {
        let mut value = self.guard();
        *value = value
            .checked_add(1)
            .ok_or(CoreError::CounterOverflow { value: *value })?;
        Ok(*value)
    }

    /// Subtract one; fails with [`CoreError::CounterUnderflow`] instead of
    /// wrapping.
    pub fn decrement(&self) -> CoreResult<i32> {
        let mut value = self.guard();
        *value = value
            .checked_sub(1)
            .ok_or(CoreError::CounterUnderflow { value: *value })?;
        Ok(*value)
    }

    pub fn reset(&self) {
        *self.guard() = 0;
    }

    /// Force a value.  Test and replay helper.
    pub fn set(&self, value: i32) {
        *self.guard() = value;
    }
}
