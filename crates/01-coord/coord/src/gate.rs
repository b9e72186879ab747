//! Reader/writer arbitration over a shared value.
//!
//! Any number of readers may hold the gate at once; a writer holds it alone.
//! The [`Priority`] chosen at construction decides who goes first when both
//! kinds are queued:
//!
//! * [`Priority::ReaderPreference`] blocks a new reader only behind an
//!   *active* writer. Readers may overtake waiting writers, so a steady
//!   stream of readers can starve writers indefinitely.
//! * [`Priority::WriterPreference`] also blocks a new reader while any writer
//!   is waiting. Writers are bounded but a steady stream of writers can
//!   starve readers.
//!
//! Neither starvation mode is corrected here; callers pick the risk they can
//! live with.
//!
//! Access goes through [`ReadGuard`] and [`WriteGuard`], which pair every
//! `begin_*` with exactly one `end_*`. The guarded value is only reachable
//! through a guard, so writes made under a [`WriteGuard`] are fully visible to
//! the next reader admitted by the gate.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::error::{CoordError, CoordResult};
use crate::sync::{Condvar, Guard, Mutex, Wake};

/// Which side of the gate wins when readers and writers contend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Readers are held back only by an active writer.
    ReaderPreference,
    /// Readers are also held back by any waiting writer.
    #[default]
    WriterPreference,
}

#[derive(Default)]
struct GateState {
    active_readers: usize,
    active_writer: bool,
    waiting_writers: usize,
    waiting_readers: usize,
}

impl GateState {
    fn reader_blocked(&self, priority: Priority) -> bool {
        self.active_writer
            || (priority == Priority::WriterPreference && self.waiting_writers > 0)
    }

    fn writer_blocked(&self) -> bool {
        self.active_readers > 0 || self.active_writer
    }

    #[inline]
    fn check(&self) {
        assert!(
            !(self.active_writer && self.active_readers > 0),
            "gate admitted {} readers alongside a writer",
            self.active_readers
        );
    }
}

/// Point-in-time view of the gate counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateSnapshot {
    pub active_readers: usize,
    pub active_writer: bool,
    pub waiting_writers: usize,
    pub waiting_readers: usize,
}

impl GateSnapshot {
    /// Number of writers currently holding the gate, `0` or `1`.
    pub fn active_writers(&self) -> usize {
        usize::from(self.active_writer)
    }

    /// True when the reader/writer exclusion invariant holds.
    pub fn is_exclusive(&self) -> bool {
        !(self.active_writer && self.active_readers > 0)
    }
}

/// Reader/writer gate guarding a value of type `T`.
pub struct AccessGate<T> {
    priority: Priority,
    state: Mutex<GateState>,
    can_read: Condvar,
    can_write: Condvar,
    value: UnsafeCell<T>,
}

// SAFETY: The value is only reached through `ReadGuard` (shared, many threads,
// no writer admitted) or `WriteGuard` (exclusive, single thread). The gate state
// machine enforces that split, matching the bounds `RwLock` requires.
unsafe impl<T: Send> Send for AccessGate<T> {}
// SAFETY: See above; shared readers need `T: Sync`, moving writes across
// threads needs `T: Send`.
unsafe impl<T: Send + Sync> Sync for AccessGate<T> {}

impl<T> AccessGate<T> {
    /// Wraps `value` behind a gate using the given priority policy.
    pub fn new(value: T, priority: Priority) -> Self {
        Self {
            priority,
            state: Mutex::new(GateState::default()),
            can_read: Condvar::new(),
            can_write: Condvar::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.state.lock();
        GateSnapshot {
            active_readers: state.active_readers,
            active_writer: state.active_writer,
            waiting_writers: state.waiting_writers,
            waiting_readers: state.waiting_readers,
        }
    }

    /// Blocks until a reader may enter, then returns shared access.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.begin_read();
        ReadGuard { gate: self }
    }

    /// Like [`AccessGate::read`] but gives up at `deadline`.
    pub fn read_until(&self, deadline: Instant) -> CoordResult<ReadGuard<'_, T>> {
        self.begin_read_until(Some(deadline))?;
        Ok(ReadGuard { gate: self })
    }

    /// Blocks until the gate is free of readers and writers, then returns
    /// exclusive access.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.begin_write();
        WriteGuard { gate: self }
    }

    /// Like [`AccessGate::write`] but gives up at `deadline`, withdrawing the
    /// registered intent.
    pub fn write_until(&self, deadline: Instant) -> CoordResult<WriteGuard<'_, T>> {
        self.begin_write_until(Some(deadline))?;
        Ok(WriteGuard { gate: self })
    }

    /// Consumes the gate and returns the guarded value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Direct access when the caller already owns the gate exclusively.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    fn begin_read(&self) {
        if let Err(err) = self.begin_read_until(None) {
            unreachable!("unbounded read wait failed: {err}");
        }
    }

    fn begin_read_until(&self, deadline: Option<Instant>) -> CoordResult<()> {
        let mut state = self.state.lock();
        if state.reader_blocked(self.priority) {
            state.waiting_readers += 1;
            while state.reader_blocked(self.priority) {
                let (guard, wake) = self.park(&self.can_read, state, deadline);
                state = guard;
                if wake == Wake::TimedOut && state.reader_blocked(self.priority) {
                    state.waiting_readers -= 1;
                    tracing::trace!("reader gave up waiting");
                    return Err(CoordError::TimedOut);
                }
            }
            state.waiting_readers -= 1;
        }
        state.active_readers += 1;
        state.check();
        tracing::trace!(readers = state.active_readers, "reader entered");
        Ok(())
    }

    fn end_read(&self) {
        let mut state = self.state.lock();
        assert!(state.active_readers > 0, "end_read without an active reader");
        state.active_readers -= 1;
        tracing::trace!(readers = state.active_readers, "reader left");
        if state.active_readers == 0 && state.waiting_writers > 0 {
            drop(state);
            self.can_write.notify_one();
        }
    }

    fn begin_write(&self) {
        if let Err(err) = self.begin_write_until(None) {
            unreachable!("unbounded write wait failed: {err}");
        }
    }

    fn begin_write_until(&self, deadline: Option<Instant>) -> CoordResult<()> {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while state.writer_blocked() {
            let (guard, wake) = self.park(&self.can_write, state, deadline);
            state = guard;
            if wake == Wake::TimedOut && state.writer_blocked() {
                state.waiting_writers -= 1;
                tracing::trace!("writer withdrew its intent");
                self.after_writer_withdrawn(state);
                return Err(CoordError::TimedOut);
            }
        }
        state.waiting_writers -= 1;
        state.active_writer = true;
        state.check();
        tracing::trace!(waiting = state.waiting_writers, "writer entered");
        Ok(())
    }

    fn end_write(&self) {
        let mut state = self.state.lock();
        assert!(state.active_writer, "end_write without an active writer");
        state.active_writer = false;
        let writers_waiting = state.waiting_writers > 0;
        let readers_waiting = state.waiting_readers > 0;
        tracing::trace!(
            waiting_writers = state.waiting_writers,
            waiting_readers = state.waiting_readers,
            "writer left"
        );
        drop(state);
        if writers_waiting {
            self.can_write.notify_one();
        }
        // Reader preference lets queued readers overtake the woken writer.
        if readers_waiting && (!writers_waiting || self.priority == Priority::ReaderPreference) {
            self.can_read.notify_all();
        }
    }

    /// Passes on wakeups a withdrawing writer might have been holding back.
    fn after_writer_withdrawn(&self, state: Guard<'_, GateState>) {
        let wake_readers = self.priority == Priority::WriterPreference
            && state.waiting_writers == 0
            && !state.active_writer
            && state.waiting_readers > 0;
        let wake_writer =
            state.waiting_writers > 0 && !state.active_writer && state.active_readers == 0;
        drop(state);
        if wake_readers {
            self.can_read.notify_all();
        }
        if wake_writer {
            self.can_write.notify_one();
        }
    }

    fn park<'a>(
        &self,
        condvar: &Condvar,
        state: Guard<'a, GateState>,
        deadline: Option<Instant>,
    ) -> (Guard<'a, GateState>, Wake) {
        match deadline {
            Some(deadline) => condvar.wait_until(state, deadline),
            None => (condvar.wait(state), Wake::Notified),
        }
    }
}

impl<T: Default> Default for AccessGate<T> {
    fn default() -> Self {
        Self::new(T::default(), Priority::default())
    }
}

impl<T> fmt::Debug for AccessGate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGate")
            .field("priority", &self.priority)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Shared access to the gated value; leaving the scope ends the read.
pub struct ReadGuard<'a, T> {
    gate: &'a AccessGate<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: A live ReadGuard means the gate counted this reader and
        // admits no writer until it drops.
        unsafe { &*self.gate.value.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.gate.end_read();
    }
}

/// Exclusive access to the gated value; leaving the scope ends the write.
pub struct WriteGuard<'a, T> {
    gate: &'a AccessGate<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: A live WriteGuard is the only party admitted by the gate.
        unsafe { &*self.gate.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: As for `deref`; `&mut self` keeps the borrow unique.
        unsafe { &mut *self.gate.value.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.gate.end_write();
    }
}
