use std::sync::Arc;

use parking_lot::Mutex;

/// Counters shared by every actor of a scenario run.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ScenarioStats {
    /// Items produced, pairs granted, or writes completed.
    pub produced: u64,
    /// Items consumed or reads completed.
    pub consumed: u64,
    /// Exclusion violations observed while holding a resource.
    pub violations: u64,
    /// Largest occupancy observed: queue depth, active editors or concurrent readers.
    pub peak_active: u64,
}

impl ScenarioStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn observe_active(&mut self, active: usize) {
        self.peak_active = self.peak_active.max(active as u64);
    }
}

pub trait StatsSink: Clone + Send + Sync + 'static {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R;

    fn snapshot(&self) -> ScenarioStats {
        self.with_stats(|stats| *stats)
    }
}

#[derive(Clone, Default)]
pub struct ArcStatsSink(pub Arc<Mutex<ScenarioStats>>);

impl StatsSink for ArcStatsSink {
    fn with_stats<R>(&self, f: impl FnOnce(&mut ScenarioStats) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }
}
