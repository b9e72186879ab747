use std::collections::BTreeSet;

use coord::ActorState;

use crate::catalog::CatalogReport;
use crate::config::{CatalogConfig, PrintQueueConfig, StudioConfig};
use crate::print_queue::PrintQueueReport;
use crate::stats::ScenarioStats;
use crate::studio::StudioReport;

pub type CheckResult = Result<(), String>;

pub fn verify_print_queue(
    report: &PrintQueueReport,
    stats: &ScenarioStats,
    config: &PrintQueueConfig,
) -> CheckResult {
    let expected = u64::from(config.producers) * u64::from(config.docs_per_producer);
    if report.total_printed() as u64 != expected {
        return Err(format!(
            "printed {} documents (expected {})",
            report.total_printed(),
            expected
        ));
    }

    let mut ids = BTreeSet::new();
    for doc in report.printed.iter().flatten() {
        if !ids.insert(doc.id) {
            return Err(format!("document {} printed twice", doc.id));
        }
    }
    if ids.len() as u64 != expected {
        return Err(format!("{} distinct documents (expected {})", ids.len(), expected));
    }

    for (printer, docs) in report.printed.iter().enumerate() {
        for producer in 0..config.producers {
            let mut last = None;
            for doc in docs.iter().filter(|doc| doc.producer_id == producer) {
                if last.is_some_and(|prev| prev >= doc.id) {
                    return Err(format!(
                        "printer {printer} saw producer {producer} documents out of order"
                    ));
                }
                last = Some(doc.id);
            }
        }
    }

    if report.metrics.peak_len > report.capacity {
        return Err(format!(
            "queue held {} documents (capacity {})",
            report.metrics.peak_len, report.capacity
        ));
    }
    if stats.produced != expected || stats.consumed != expected {
        return Err(format!(
            "stats produced {} consumed {} (expected {})",
            stats.produced, stats.consumed, expected
        ));
    }
    Ok(())
}

pub fn verify_studio(
    report: &StudioReport,
    stats: &ScenarioStats,
    config: &StudioConfig,
) -> CheckResult {
    if let Some((editor, done)) = report
        .sessions
        .iter()
        .enumerate()
        .find(|(_, done)| **done != config.sessions_per_editor)
    {
        return Err(format!(
            "editor {editor} completed {done} sessions (expected {})",
            config.sessions_per_editor
        ));
    }
    if stats.violations != 0 {
        return Err(format!(
            "{} sessions overlapped with a neighbour",
            stats.violations
        ));
    }
    let final_state = &report.final_state;
    if final_state.actors.iter().any(|state| *state != ActorState::Idle)
        || final_state.holders.iter().any(Option::is_some)
    {
        return Err("boards still held after every editor finished".into());
    }
    let max_active = (config.editors / 2).max(1) as u64;
    if stats.peak_active > max_active {
        return Err(format!(
            "{} editors active at once (at most {} fit)",
            stats.peak_active, max_active
        ));
    }
    Ok(())
}

pub fn verify_catalog(
    report: &CatalogReport,
    stats: &ScenarioStats,
    config: &CatalogConfig,
) -> CheckResult {
    let reads = u64::from(config.readers) * u64::from(config.reads_per_reader);
    let writes = u64::from(config.writers) * u64::from(config.writes_per_writer);
    if stats.consumed != reads {
        return Err(format!("completed {} reads (expected {})", stats.consumed, reads));
    }
    if stats.produced != writes {
        return Err(format!("completed {} writes (expected {})", stats.produced, writes));
    }
    if stats.violations != 0 {
        return Err(format!(
            "{} accesses overlapped a writer",
            stats.violations
        ));
    }
    if report.catalog.len() != config.products as usize {
        return Err(format!(
            "catalog holds {} products (expected {})",
            report.catalog.len(),
            config.products
        ));
    }
    if let Some(record) = report.catalog.records().iter().find(|r| !r.price.is_finite()) {
        return Err(format!("product {} has a non-finite price", record.id));
    }
    Ok(())
}
