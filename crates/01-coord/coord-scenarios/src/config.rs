//! Scenario configuration.
//!
//! Defaults reproduce the workloads the coordinators were first exercised
//! with: a five-slot print queue fed by three applications, five editors
//! sharing five boards, and a hundred-product catalog browsed by five
//! customers while two clerks update it.

use std::time::Duration;

use coord::Priority;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

/// Upper bounds for the random pauses an actor takes around each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Longest pause between two operations, in milliseconds.
    pub max_think_ms: u64,
    /// Longest time spent holding a resource, in milliseconds.
    pub max_work_ms: u64,
}

impl Pacing {
    /// No pauses at all; used by tests and `--fast` runs.
    pub const IMMEDIATE: Pacing = Pacing {
        max_think_ms: 0,
        max_work_ms: 0,
    };

    pub fn new(max_think_ms: u64, max_work_ms: u64) -> Self {
        Self {
            max_think_ms,
            max_work_ms,
        }
    }

    pub fn think<R: Rng>(&self, rng: &mut R) -> Duration {
        random_millis(rng, self.max_think_ms)
    }

    pub fn work<R: Rng>(&self, rng: &mut R) -> Duration {
        random_millis(rng, self.max_work_ms)
    }

    /// Work time scaled by `weight` percent of the maximum.
    pub fn weighted_work(&self, weight_pct: u32) -> Duration {
        Duration::from_millis(self.max_work_ms * u64::from(weight_pct.min(100)) / 100)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

fn random_millis<R: Rng>(rng: &mut R, max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..max_ms))
}

/// Partial pacing as written in a config file.
///
/// Fields left out keep the owning scenario's default rather than the
/// [`Pacing::IMMEDIATE`] fallback a bare `Pacing` would use.
#[derive(Deserialize)]
struct PacingPatch {
    max_think_ms: Option<u64>,
    max_work_ms: Option<u64>,
}

impl PacingPatch {
    fn over(self, base: Pacing) -> Pacing {
        Pacing {
            max_think_ms: self.max_think_ms.unwrap_or(base.max_think_ms),
            max_work_ms: self.max_work_ms.unwrap_or(base.max_work_ms),
        }
    }
}

fn patch_pacing<'de, D: Deserializer<'de>>(
    deserializer: D,
    base: Pacing,
) -> Result<Pacing, D::Error> {
    PacingPatch::deserialize(deserializer).map(|patch| patch.over(base))
}

fn print_queue_pacing<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pacing, D::Error> {
    patch_pacing(deserializer, PrintQueueConfig::default().pacing)
}

fn studio_pacing<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pacing, D::Error> {
    patch_pacing(deserializer, StudioConfig::default().pacing)
}

fn reader_pacing<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pacing, D::Error> {
    patch_pacing(deserializer, CatalogConfig::default().reader_pacing)
}

fn writer_pacing<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pacing, D::Error> {
    patch_pacing(deserializer, CatalogConfig::default().writer_pacing)
}

/// Serializable mirror of [`Priority`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityPolicy {
    ReaderPreference,
    #[default]
    WriterPreference,
}

impl From<PriorityPolicy> for Priority {
    fn from(policy: PriorityPolicy) -> Self {
        match policy {
            PriorityPolicy::ReaderPreference => Priority::ReaderPreference,
            PriorityPolicy::WriterPreference => Priority::WriterPreference,
        }
    }
}

/// Producers submit documents to a bounded print queue drained by printers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintQueueConfig {
    pub capacity: usize,
    pub producers: u32,
    pub consumers: u32,
    pub docs_per_producer: u32,
    /// Think time between submissions; work time is scaled by document size.
    #[serde(deserialize_with = "print_queue_pacing")]
    pub pacing: Pacing,
    pub seed: u64,
}

impl Default for PrintQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            producers: 3,
            consumers: 2,
            docs_per_producer: 10,
            pacing: Pacing::new(500, 1_000),
            seed: 0x5052_494E,
        }
    }
}

/// Editors around a table of shared processing boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Number of editors, which is also the number of boards.
    pub editors: usize,
    pub sessions_per_editor: u32,
    #[serde(deserialize_with = "studio_pacing")]
    pub pacing: Pacing,
    pub seed: u64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            editors: 5,
            sessions_per_editor: 3,
            pacing: Pacing::new(2_000, 3_000),
            seed: 0x5354_5544,
        }
    }
}

/// Customers browsing and clerks updating a shared product catalog.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub readers: u32,
    pub writers: u32,
    pub reads_per_reader: u32,
    pub writes_per_writer: u32,
    pub products: u32,
    pub priority: PriorityPolicy,
    #[serde(deserialize_with = "reader_pacing")]
    pub reader_pacing: Pacing,
    #[serde(deserialize_with = "writer_pacing")]
    pub writer_pacing: Pacing,
    pub seed: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            readers: 5,
            writers: 2,
            reads_per_reader: 5,
            writes_per_writer: 3,
            products: 100,
            priority: PriorityPolicy::default(),
            reader_pacing: Pacing::new(1_000, 500),
            writer_pacing: Pacing::new(2_000, 1_000),
            seed: 0x4341_5441,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn immediate_pacing_never_sleeps() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Pacing::IMMEDIATE.think(&mut rng), Duration::ZERO);
        assert_eq!(Pacing::IMMEDIATE.work(&mut rng), Duration::ZERO);
        assert_eq!(Pacing::IMMEDIATE.weighted_work(80), Duration::ZERO);
    }

    #[test]
    fn pauses_stay_below_maximum() {
        let mut rng = StdRng::seed_from_u64(7);
        let pacing = Pacing::new(20, 30);
        for _ in 0..100 {
            assert!(pacing.think(&mut rng) < Duration::from_millis(20));
            assert!(pacing.work(&mut rng) < Duration::from_millis(30));
        }
        assert_eq!(pacing.weighted_work(50), Duration::from_millis(15));
        assert_eq!(pacing.weighted_work(400), Duration::from_millis(30));
    }

    #[test]
    fn policy_maps_onto_gate_priority() {
        assert_eq!(
            Priority::from(PriorityPolicy::ReaderPreference),
            Priority::ReaderPreference
        );
        assert_eq!(Priority::from(PriorityPolicy::default()), Priority::WriterPreference);
    }
}
