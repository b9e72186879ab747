//! Fixed-capacity blocking channel over a pre-allocated slot ring.
//!
//! One lock guards the slots together with the `head`/`tail`/`count` indices,
//! so a slot claim and the index update that publishes it are a single atomic
//! step. Two condition variables split the waiters: inserters park on
//! `space_available`, removers on `item_available`. Ordinary transitions wake
//! one waiter of the opposite kind; [`BoundedChannel::close`] wakes everyone.
//!
//! Producers may optionally register through [`BoundedChannel::producer`]. The
//! channel closes itself once the last registered producer goes away, letting
//! consumers drain what is left and then observe [`RemoveError::Closed`].

use std::sync::Arc;
use std::time::Instant;

use crate::error::{CoordError, CoordResult, InsertError, RemoveError};
use crate::sync::{Condvar, Guard, Mutex, Wake};

struct ChannelState<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
    closed: bool,
    producers: usize,
    metrics: ChannelMetrics,
}

impl<T> ChannelState<T> {
    fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>();
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
            closed: false,
            producers: 0,
            metrics: ChannelMetrics::default(),
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    fn push(&mut self, item: T) {
        debug_assert!(self.slots[self.tail].is_none(), "slot {} already occupied", self.tail);
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
        self.metrics.inserted += 1;
        self.metrics.peak_len = self.metrics.peak_len.max(self.count);
        self.check_indices();
    }

    fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some(), "slot {} empty with count {}", self.head, self.count);
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        self.metrics.removed += 1;
        self.check_indices();
        item
    }

    #[inline]
    fn check_indices(&self) {
        let capacity = self.capacity();
        debug_assert!(self.count <= capacity);
        debug_assert_eq!(
            (self.tail + capacity - self.head) % capacity,
            self.count % capacity,
            "ring indices out of step with count"
        );
    }
}

/// Counters accumulated by a channel over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelMetrics {
    /// Items accepted by any insert path.
    pub inserted: u64,
    /// Items handed out by any remove path.
    pub removed: u64,
    /// Times an inserter found the channel full and had to park.
    pub insert_waits: u64,
    /// Times a remover found the channel empty and had to park.
    pub remove_waits: u64,
    /// Highest occupancy ever observed.
    pub peak_len: usize,
}

/// Bounded multi-producer/multi-consumer channel with blocking insert/remove.
pub struct BoundedChannel<T> {
    state: Mutex<ChannelState<T>>,
    space_available: Condvar,
    item_available: Condvar,
}

impl<T> BoundedChannel<T> {
    /// Creates an empty channel holding at most `capacity` items.
    pub fn new(capacity: usize) -> CoordResult<Self> {
        if capacity == 0 {
            return Err(CoordError::InvalidConfig("channel capacity must be non-zero"));
        }
        Ok(Self {
            state: Mutex::new(ChannelState::new(capacity)),
            space_available: Condvar::new(),
            item_available: Condvar::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn metrics(&self) -> ChannelMetrics {
        self.state.lock().metrics
    }

    /// Blocks while the channel is full, then appends `item`.
    ///
    /// Fails fast with [`InsertError::Closed`] once the channel is closed,
    /// including when closure happens while the caller is parked.
    pub fn insert(&self, item: T) -> Result<(), InsertError<T>> {
        let mut state = self.state.lock();
        let mut parked = false;
        while state.is_full() && !state.closed {
            if !parked {
                state.metrics.insert_waits += 1;
                parked = true;
            }
            state = self.space_available.wait(state);
        }
        self.finish_insert(state, item)
    }

    /// Like [`BoundedChannel::insert`] but gives up at `deadline`.
    pub fn insert_until(&self, item: T, deadline: Instant) -> Result<(), InsertError<T>> {
        let mut state = self.state.lock();
        let mut parked = false;
        while state.is_full() && !state.closed {
            if !parked {
                state.metrics.insert_waits += 1;
                parked = true;
            }
            let (guard, wake) = self.space_available.wait_until(state, deadline);
            state = guard;
            if wake == Wake::TimedOut && state.is_full() && !state.closed {
                tracing::trace!(len = state.count, "insert timed out");
                return Err(InsertError::TimedOut(item));
            }
        }
        self.finish_insert(state, item)
    }

    /// Appends `item` only if a slot is free right now.
    pub fn try_insert(&self, item: T) -> Result<(), InsertError<T>> {
        let state = self.state.lock();
        if state.closed {
            return Err(InsertError::Closed(item));
        }
        if state.is_full() {
            return Err(InsertError::Full(item));
        }
        self.finish_insert(state, item)
    }

    fn finish_insert(
        &self,
        mut state: Guard<'_, ChannelState<T>>,
        item: T,
    ) -> Result<(), InsertError<T>> {
        if state.closed {
            return Err(InsertError::Closed(item));
        }
        let slot = state.tail;
        state.push(item);
        tracing::trace!(slot, len = state.count, "item inserted");
        drop(state);
        self.item_available.notify_one();
        Ok(())
    }

    /// Blocks while the channel is empty and open, then takes the oldest item.
    ///
    /// Buffered items are still handed out after close; only a closed and
    /// drained channel reports [`RemoveError::Closed`].
    pub fn remove(&self) -> Result<T, RemoveError> {
        let mut state = self.state.lock();
        let mut parked = false;
        while state.count == 0 && !state.closed {
            if !parked {
                state.metrics.remove_waits += 1;
                parked = true;
            }
            state = self.item_available.wait(state);
        }
        self.finish_remove(state)
    }

    /// Like [`BoundedChannel::remove`] but gives up at `deadline`.
    pub fn remove_until(&self, deadline: Instant) -> Result<T, RemoveError> {
        let mut state = self.state.lock();
        let mut parked = false;
        while state.count == 0 && !state.closed {
            if !parked {
                state.metrics.remove_waits += 1;
                parked = true;
            }
            let (guard, wake) = self.item_available.wait_until(state, deadline);
            state = guard;
            if wake == Wake::TimedOut && state.count == 0 && !state.closed {
                tracing::trace!("remove timed out");
                return Err(RemoveError::TimedOut);
            }
        }
        self.finish_remove(state)
    }

    /// Takes the oldest item only if one is buffered right now.
    pub fn try_remove(&self) -> Result<T, RemoveError> {
        let state = self.state.lock();
        if state.count == 0 {
            return Err(if state.closed {
                RemoveError::Closed
            } else {
                RemoveError::Empty
            });
        }
        self.finish_remove(state)
    }

    fn finish_remove(&self, mut state: Guard<'_, ChannelState<T>>) -> Result<T, RemoveError> {
        let slot = state.head;
        let Some(item) = state.pop() else {
            return Err(RemoveError::Closed);
        };
        tracing::trace!(slot, len = state.count, "item removed");
        drop(state);
        self.space_available.notify_one();
        Ok(item)
    }

    /// Marks the channel closed and releases every parked caller.
    ///
    /// Closing is idempotent. Later inserts fail with [`InsertError::Closed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        tracing::debug!(len = state.count, "channel closed");
        drop(state);
        self.space_available.notify_all();
        self.item_available.notify_all();
    }

    /// Registers a producer whose drop may close the channel.
    ///
    /// The channel closes when the number of live registered producers falls
    /// back to zero. Callers that never register keep full manual control via
    /// [`BoundedChannel::close`].
    pub fn producer(self: &Arc<Self>) -> Producer<T> {
        let mut state = self.state.lock();
        state.producers += 1;
        tracing::trace!(producers = state.producers, "producer registered");
        drop(state);
        Producer {
            channel: Arc::clone(self),
        }
    }

    fn producer_finished(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.producers > 0, "producer count underflow");
        state.producers = state.producers.saturating_sub(1);
        let last = state.producers == 0;
        tracing::trace!(producers = state.producers, "producer finished");
        drop(state);
        if last {
            self.close();
        }
    }
}

/// Registered producer handle; see [`BoundedChannel::producer`].
pub struct Producer<T> {
    channel: Arc<BoundedChannel<T>>,
}

impl<T> Producer<T> {
    pub fn insert(&self, item: T) -> Result<(), InsertError<T>> {
        self.channel.insert(item)
    }

    pub fn insert_until(&self, item: T, deadline: Instant) -> Result<(), InsertError<T>> {
        self.channel.insert_until(item, deadline)
    }

    pub fn try_insert(&self, item: T) -> Result<(), InsertError<T>> {
        self.channel.try_insert(item)
    }

    pub fn channel(&self) -> &Arc<BoundedChannel<T>> {
        &self.channel
    }
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        self.channel.producer()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.channel.producer_finished();
    }
}
