//! Video studio: editors need the two boards on either side of their seat.

use std::thread;

use coord::{ResourceRing, RingSnapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::StudioConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::stats::StatsSink;

#[derive(Debug)]
pub struct StudioReport {
    /// Sessions each editor completed.
    pub sessions: Vec<u32>,
    /// Ring state after every editor went home.
    pub final_state: RingSnapshot,
}

/// Runs every editor through its sessions on a fresh ring.
///
/// While holding its boards an editor samples the ring and records a
/// violation if any two neighbours are active together.
pub fn run_studio<S: StatsSink>(config: &StudioConfig, stats: S) -> ScenarioResult<StudioReport> {
    let ring = ResourceRing::new(config.editors)?;

    let sessions = thread::scope(|scope| {
        let editors = (0..config.editors)
            .map(|editor| {
                let ring = &ring;
                let stats = stats.clone();
                let config = *config;
                scope.spawn(move || -> ScenarioResult<u32> {
                    let mut rng = StdRng::seed_from_u64(config.seed ^ editor as u64);
                    let mut completed = 0;
                    for session in 0..config.sessions_per_editor {
                        thread::sleep(config.pacing.think(&mut rng));
                        tracing::debug!(editor, session, "waiting for boards");
                        let lease = ring.lease(editor)?;
                        let snapshot = ring.snapshot();
                        stats.with_stats(|stats| {
                            stats.produced += 1;
                            stats.observe_active(snapshot.active_count());
                            if snapshot.has_adjacent_active() {
                                stats.violations += 1;
                            }
                        });
                        let (left, right) = ring.units_of(editor)?;
                        tracing::debug!(editor, left, right, "editing");
                        thread::sleep(config.pacing.work(&mut rng));
                        drop(lease);
                        completed += 1;
                    }
                    tracing::info!(editor, completed, "editor finished");
                    Ok(completed)
                })
            })
            .collect::<Vec<_>>();

        editors
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| ScenarioError::WorkerPanicked { role: "editor" })?
            })
            .collect::<ScenarioResult<Vec<_>>>()
    })?;

    Ok(StudioReport {
        sessions,
        final_state: ring.snapshot(),
    })
}
