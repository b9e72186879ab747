//! E-commerce catalog: customers browse while clerks reprice and restock.

use std::thread;

use coord::{Catalog, Priority, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::CatalogConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::stats::StatsSink;

#[derive(Debug)]
pub struct CatalogReport {
    pub priority: Priority,
    pub catalog: Catalog,
}

/// Builds the initial catalog: ids from 1, prices in [10, 1010), stock below 50.
pub fn seed_catalog(products: u32, seed: u64) -> Catalog {
    let mut rng = StdRng::seed_from_u64(seed);
    (1..=products)
        .map(|id| Record::new(id, 10.0 + f64::from(rng.gen_range(0..1_000u32)), rng.gen_range(0..50)))
        .collect()
}

/// Runs customers and clerks against a freshly seeded catalog.
///
/// Every access samples the gate counters while inside and records a
/// violation if a writer ever shares the gate.
pub fn run_catalog<S: StatsSink>(config: &CatalogConfig, stats: S) -> ScenarioResult<CatalogReport> {
    if config.products == 0 && (config.readers > 0 || config.writers > 0) {
        return Err(ScenarioError::InvalidConfig("catalog needs at least one product"));
    }
    let priority = Priority::from(config.priority);
    let gate = seed_catalog(config.products, config.seed).into_gate(priority);

    thread::scope(|scope| {
        let readers = (0..config.readers)
            .map(|reader| {
                let gate = &gate;
                let stats = stats.clone();
                let config = *config;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(config.seed ^ (u64::from(reader) << 8));
                    for _ in 0..config.reads_per_reader {
                        {
                            let catalog = gate.read();
                            let snapshot = gate.snapshot();
                            let index = rng.gen_range(0..catalog.len());
                            if let Some(record) = catalog.get(index) {
                                tracing::debug!(
                                    reader,
                                    product = record.id,
                                    price = record.price,
                                    stock = record.stock,
                                    "browsing"
                                );
                            }
                            stats.with_stats(|stats| {
                                stats.consumed += 1;
                                stats.observe_active(snapshot.active_readers);
                                if snapshot.active_writer {
                                    stats.violations += 1;
                                }
                            });
                            thread::sleep(config.reader_pacing.work(&mut rng));
                        }
                        thread::sleep(config.reader_pacing.think(&mut rng));
                    }
                    tracing::info!(reader, reads = config.reads_per_reader, "customer finished");
                })
            })
            .collect::<Vec<_>>();

        let writers = (0..config.writers)
            .map(|writer| {
                let gate = &gate;
                let stats = stats.clone();
                let config = *config;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(!config.seed ^ u64::from(writer));
                    for _ in 0..config.writes_per_writer {
                        {
                            let mut catalog = gate.write();
                            let snapshot = gate.snapshot();
                            let index = rng.gen_range(0..catalog.len());
                            let price_pct = f64::from(rng.gen_range(-10..10i32));
                            let stock_delta = rng.gen_range(-3..=6i64);
                            if let Some(record) = catalog.adjust(index, price_pct, stock_delta) {
                                tracing::debug!(
                                    writer,
                                    product = record.id,
                                    price = record.price,
                                    stock = record.stock,
                                    "updated"
                                );
                            }
                            stats.with_stats(|stats| {
                                stats.produced += 1;
                                if snapshot.active_readers > 0 || !snapshot.active_writer {
                                    stats.violations += 1;
                                }
                            });
                            thread::sleep(config.writer_pacing.work(&mut rng));
                        }
                        thread::sleep(config.writer_pacing.think(&mut rng));
                    }
                    tracing::info!(writer, writes = config.writes_per_writer, "clerk finished");
                })
            })
            .collect::<Vec<_>>();

        for handle in readers {
            handle
                .join()
                .map_err(|_| ScenarioError::WorkerPanicked { role: "reader" })?;
        }
        for handle in writers {
            handle
                .join()
                .map_err(|_| ScenarioError::WorkerPanicked { role: "writer" })?;
        }
        Ok::<_, ScenarioError>(())
    })?;

    Ok(CatalogReport {
        priority,
        catalog: gate.into_inner(),
    })
}
