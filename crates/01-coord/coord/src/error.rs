//! Error surface for the coordinators.
//!
//! Construction and contract failures share [`CoordError`]. The channel keeps
//! its own pair of error types so a rejected insert can hand the item back.

use std::fmt;

use thiserror::Error;

/// Convenience result alias for fallible coordinator operations.
pub type CoordResult<T, E = CoordError> = Result<T, E>;

/// Errors surfaced by ring and gate operations and by every constructor.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CoordError {
    /// A sizing parameter was rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The actor index does not name a seat in the ring.
    #[error("actor {actor} is outside a ring of {size}")]
    UnknownActor { actor: usize, size: usize },

    /// The actor already has a pending or granted request.
    #[error("actor {actor} already requested its pair")]
    AlreadyRequested { actor: usize },

    /// The actor tried to release a pair it does not hold.
    #[error("actor {actor} released a pair it does not hold")]
    NotHeld { actor: usize },

    /// The deadline elapsed before the caller could proceed.
    #[error("deadline elapsed before the request was granted")]
    TimedOut,
}

/// Reasons an insert did not place its item into the channel.
///
/// Every variant returns ownership of the rejected item.
#[derive(Error, PartialEq, Eq)]
pub enum InsertError<T> {
    /// The channel was full and the caller asked not to block.
    #[error("channel is full")]
    Full(T),
    /// The channel was closed before the item could be placed.
    #[error("channel is closed")]
    Closed(T),
    /// The deadline elapsed while waiting for space.
    #[error("timed out waiting for space")]
    TimedOut(T),
}

impl<T> InsertError<T> {
    /// Recovers the item that could not be inserted.
    pub fn into_inner(self) -> T {
        match self {
            InsertError::Full(item) | InsertError::Closed(item) | InsertError::TimedOut(item) => {
                item
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, InsertError::Closed(_))
    }
}

impl<T> fmt::Debug for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InsertError::Full(_) => "Full",
            InsertError::Closed(_) => "Closed",
            InsertError::TimedOut(_) => "TimedOut",
        };
        write!(f, "{name}(..)")
    }
}

/// Reasons a remove returned without an item.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RemoveError {
    /// The channel was empty and the caller asked not to block.
    #[error("channel is empty")]
    Empty,
    /// The channel is closed and every buffered item has been drained.
    #[error("channel is closed and drained")]
    Closed,
    /// The deadline elapsed while waiting for an item.
    #[error("timed out waiting for an item")]
    TimedOut,
}
