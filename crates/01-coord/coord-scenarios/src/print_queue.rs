//! Print queue: applications submit documents, printers drain them.

use std::sync::Arc;
use std::thread;

use coord::{BoundedChannel, ChannelMetrics, InsertError, RemoveError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PrintQueueConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::stats::StatsSink;

/// A job submitted to the print queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub id: u32,
    pub kind: String,
    pub size_kb: u32,
    pub producer_id: u32,
}

/// What each printer consumed, in removal order.
#[derive(Debug)]
pub struct PrintQueueReport {
    pub printed: Vec<Vec<Document>>,
    pub metrics: ChannelMetrics,
    pub capacity: usize,
}

impl PrintQueueReport {
    pub fn total_printed(&self) -> usize {
        self.printed.iter().map(Vec::len).sum()
    }
}

/// Runs producers and printers to completion over a fresh channel.
///
/// Producers register with the channel so it closes by itself when the last
/// one finishes; printers then drain the remainder and stop.
pub fn run_print_queue<S: StatsSink>(
    config: &PrintQueueConfig,
    stats: S,
) -> ScenarioResult<PrintQueueReport> {
    if config.consumers == 0 && config.producers > 0 && config.docs_per_producer > 0 {
        return Err(ScenarioError::InvalidConfig(
            "documents would never be printed without a consumer",
        ));
    }
    // Ids run up to `producers * docs_per_producer - 1`.
    if config.producers.checked_mul(config.docs_per_producer).is_none() {
        return Err(ScenarioError::InvalidConfig(
            "producers * docs_per_producer overflows the document id space",
        ));
    }
    let channel = Arc::new(BoundedChannel::new(config.capacity)?);

    let printed = thread::scope(|scope| {
        let producers = (0..config.producers)
            .map(|producer_id| {
                let handle = channel.producer();
                let stats = stats.clone();
                let config = *config;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(config.seed ^ u64::from(producer_id));
                    let mut submitted = 0;
                    for n in 0..config.docs_per_producer {
                        let doc = Document {
                            id: producer_id * config.docs_per_producer + n,
                            kind: format!("Doc{producer_id}"),
                            size_kb: rng.gen_range(1..=100),
                            producer_id,
                        };
                        tracing::debug!(producer_id, doc = doc.id, size_kb = doc.size_kb, "submitting");
                        match handle.insert(doc) {
                            Ok(()) => {
                                submitted += 1;
                                stats.with_stats(|stats| stats.produced += 1);
                            }
                            Err(InsertError::Closed(doc)) => {
                                tracing::warn!(producer_id, doc = doc.id, "queue closed early");
                                break;
                            }
                            Err(err) => unreachable!("blocking insert returned {err}"),
                        }
                        thread::sleep(config.pacing.think(&mut rng));
                    }
                    tracing::info!(producer_id, submitted, "producer finished");
                })
            })
            .collect::<Vec<_>>();

        let consumers = (0..config.consumers)
            .map(|consumer_id| {
                let channel = Arc::clone(&channel);
                let stats = stats.clone();
                let config = *config;
                scope.spawn(move || {
                    let mut printed = Vec::new();
                    loop {
                        match channel.remove() {
                            Ok(doc) => {
                                let len = channel.len();
                                stats.with_stats(|stats| {
                                    stats.consumed += 1;
                                    stats.observe_active(len);
                                });
                                tracing::debug!(consumer_id, doc = doc.id, kind = %doc.kind, "printing");
                                thread::sleep(config.pacing.weighted_work(doc.size_kb));
                                printed.push(doc);
                            }
                            Err(RemoveError::Closed) => break,
                            Err(err) => unreachable!("blocking remove returned {err}"),
                        }
                    }
                    tracing::info!(consumer_id, printed = printed.len(), "printer finished");
                    printed
                })
            })
            .collect::<Vec<_>>();

        for handle in producers {
            handle
                .join()
                .map_err(|_| ScenarioError::WorkerPanicked { role: "producer" })?;
        }
        // Covers the zero-producer case, where no handle ever closes the queue.
        channel.close();

        consumers
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| ScenarioError::WorkerPanicked { role: "printer" })
            })
            .collect::<ScenarioResult<Vec<_>>>()
    })?;

    Ok(PrintQueueReport {
        printed,
        metrics: channel.metrics(),
        capacity: channel.capacity(),
    })
}
