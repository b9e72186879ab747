//! Lock and condition-variable shims used by every coordinator.
//!
//! Native builds use `parking_lot`, whose condition variables never report
//! poisoning and support absolute deadlines. Loom builds swap in the model
//! checker's primitives so the deterministic scheduler can explore
//! interleavings; deadline waits degrade to plain waits there.
//!
//! Both backends expose the same by-value guard API: a wait consumes the guard
//! and hands it back once the lock is re-acquired.

use std::time::Instant;

/// Outcome of a deadline-bounded wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    /// Woken by a notify (or spuriously); the caller must re-check its predicate.
    Notified,
    /// The deadline passed before any notify arrived.
    TimedOut,
}

#[cfg(not(feature = "loom"))]
mod imp {
    use super::{Instant, Wake};

    pub(crate) type Guard<'a, T> = parking_lot::MutexGuard<'a, T>;

    pub(crate) struct Mutex<T>(parking_lot::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(parking_lot::Mutex::new(value))
        }

        #[inline]
        pub(crate) fn lock(&self) -> Guard<'_, T> {
            self.0.lock()
        }
    }

    #[derive(Default)]
    pub(crate) struct Condvar(parking_lot::Condvar);

    impl Condvar {
        pub(crate) fn new() -> Self {
            Self(parking_lot::Condvar::new())
        }

        #[inline]
        pub(crate) fn wait<'a, T>(&self, mut guard: Guard<'a, T>) -> Guard<'a, T> {
            self.0.wait(&mut guard);
            guard
        }

        #[inline]
        pub(crate) fn wait_until<'a, T>(
            &self,
            mut guard: Guard<'a, T>,
            deadline: Instant,
        ) -> (Guard<'a, T>, Wake) {
            let result = self.0.wait_until(&mut guard, deadline);
            let wake = if result.timed_out() {
                Wake::TimedOut
            } else {
                Wake::Notified
            };
            (guard, wake)
        }

        #[inline]
        pub(crate) fn notify_one(&self) {
            self.0.notify_one();
        }

        #[inline]
        pub(crate) fn notify_all(&self) {
            self.0.notify_all();
        }
    }
}

#[cfg(feature = "loom")]
mod imp {
    use super::{Instant, Wake};

    pub(crate) type Guard<'a, T> = loom::sync::MutexGuard<'a, T>;

    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        #[inline]
        pub(crate) fn lock(&self) -> Guard<'_, T> {
            // Poisoning only happens when a modelled thread already panicked.
            self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    pub(crate) struct Condvar(loom::sync::Condvar);

    impl Default for Condvar {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Condvar {
        pub(crate) fn new() -> Self {
            Self(loom::sync::Condvar::new())
        }

        #[inline]
        pub(crate) fn wait<'a, T>(&self, guard: Guard<'a, T>) -> Guard<'a, T> {
            self.0
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        #[inline]
        pub(crate) fn wait_until<'a, T>(
            &self,
            guard: Guard<'a, T>,
            deadline: Instant,
        ) -> (Guard<'a, T>, Wake) {
            let _ = deadline;
            (self.wait(guard), Wake::Notified)
        }

        #[inline]
        pub(crate) fn notify_one(&self) {
            self.0.notify_one();
        }

        #[inline]
        pub(crate) fn notify_all(&self) {
            self.0.notify_all();
        }
    }
}

pub(crate) use imp::{Condvar, Guard, Mutex};
