//! Blocking coordination primitives for threads sharing scarce resources.
//!
//! Three self-contained coordinators, each guarding all of its state with a
//! single lock and parking callers on condition variables:
//! * [`BoundedChannel`] – fixed-capacity producer/consumer queue with close.
//! * [`ResourceRing`] – cyclic pairwise acquisition of adjacent units.
//! * [`AccessGate`] – concurrent readers versus exclusive writers under a
//!   configurable [`Priority`] policy.
//!
//! None of the coordinators calls into another, and none performs I/O while
//! holding its lock beyond emitting `tracing` events.

mod catalog;
mod channel;
mod error;
mod gate;
mod ring;
mod sync;

pub use catalog::{Catalog, CatalogGate, Record};
pub use channel::{BoundedChannel, ChannelMetrics, Producer};
pub use error::{CoordError, CoordResult, InsertError, RemoveError};
pub use gate::{AccessGate, GateSnapshot, Priority, ReadGuard, WriteGuard};
pub use ring::{ActorState, PairLease, ResourceRing, RingSnapshot};
