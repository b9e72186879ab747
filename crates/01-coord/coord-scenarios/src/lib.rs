//! Threaded workloads that drive the coordinators end to end.
//!
//! Each runner spawns its actors on scoped threads, paces them with seeded
//! random pauses, records counters through a [`StatsSink`], and returns a
//! report the matching `verify_*` helper can check.

mod catalog;
mod checks;
mod config;
mod error;
mod print_queue;
mod stats;
mod studio;

pub use catalog::{run_catalog, seed_catalog, CatalogReport};
pub use checks::{verify_catalog, verify_print_queue, verify_studio, CheckResult};
pub use config::{CatalogConfig, Pacing, PrintQueueConfig, PriorityPolicy, StudioConfig};
pub use error::{ScenarioError, ScenarioResult};
pub use print_queue::{run_print_queue, Document, PrintQueueReport};
pub use stats::{ArcStatsSink, ScenarioStats, StatsSink};
pub use studio::{run_studio, StudioReport};
