//! Reader/writer gate behaviour under both priority policies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use coord::{AccessGate, Catalog, CoordError, Priority, Record};
use parking_lot::Mutex;

fn wait_for(mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !predicate() {
        assert!(Instant::now() < deadline, "condition never became true");
        thread::yield_now();
    }
}

#[test]
fn many_readers_are_active_together() {
    const READERS: usize = 8;
    let gate = Arc::new(AccessGate::new(3u64, Priority::WriterPreference));
    let inside = Arc::new(Barrier::new(READERS));
    let handles = (0..READERS)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                let value = gate.read();
                // Every reader must be admitted before any can pass.
                inside.wait();
                *value
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        assert_eq!(handle.join().expect("reader"), 3);
    }
    let snapshot = gate.snapshot();
    assert_eq!(snapshot.active_readers, 0);
    assert_eq!(snapshot.active_writers(), 0);
}

#[test]
fn writers_and_readers_never_overlap() {
    const WRITERS: usize = 3;
    const READERS: usize = 5;
    const ROUNDS: usize = 300;

    for priority in [Priority::ReaderPreference, Priority::WriterPreference] {
        let gate = Arc::new(AccessGate::new((0u64, 0u64), priority));
        let violations = Arc::new(AtomicUsize::new(0));

        let writers = (0..WRITERS).map(|_| {
            let gate = Arc::clone(&gate);
            let violations = Arc::clone(&violations);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let mut pair = gate.write();
                    pair.0 += 1;
                    thread::yield_now();
                    pair.1 += 1;
                    let snapshot = gate.snapshot();
                    if snapshot.active_readers != 0 || snapshot.active_writers() != 1 {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        });
        let readers = (0..READERS).map(|_| {
            let gate = Arc::clone(&gate);
            let violations = Arc::clone(&violations);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let pair = gate.read();
                    if pair.0 != pair.1 || !gate.snapshot().is_exclusive() {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        });
        let handles = writers.chain(readers).collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("gate thread");
        }

        assert_eq!(violations.load(Ordering::Relaxed), 0, "{priority:?}");
        let total = (WRITERS * ROUNDS) as u64;
        assert_eq!(*gate.read(), (total, total));
    }
}

#[test]
fn writer_preference_serves_registered_writer_first() {
    let gate = Arc::new(AccessGate::new((), Priority::WriterPreference));
    let log = Arc::new(Mutex::new(Vec::new()));

    let first_reader = gate.read();
    let writer = {
        let gate = Arc::clone(&gate);
        let log = Arc::clone(&log);
        thread::spawn(move || {
            let _guard = gate.write();
            log.lock().push("writer");
            thread::sleep(Duration::from_millis(10));
        })
    };
    wait_for(|| gate.snapshot().waiting_writers == 1);

    let late_reader = {
        let gate = Arc::clone(&gate);
        let log = Arc::clone(&log);
        thread::spawn(move || {
            let _guard = gate.read();
            log.lock().push("late reader");
        })
    };
    wait_for(|| gate.snapshot().waiting_readers == 1);
    assert_eq!(gate.snapshot().active_readers, 1);

    drop(first_reader);
    writer.join().expect("writer");
    late_reader.join().expect("late reader");
    assert_eq!(*log.lock(), vec!["writer", "late reader"]);
}

#[test]
fn reader_preference_admits_reader_past_waiting_writer() {
    let gate = Arc::new(AccessGate::new(0u8, Priority::ReaderPreference));
    let first_reader = gate.read();
    let writer = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || *gate.write() += 1)
    };
    wait_for(|| gate.snapshot().waiting_writers == 1);

    let deadline = Instant::now() + Duration::from_secs(5);
    let late_reader = gate.read_until(deadline).expect("admitted immediately");
    assert_eq!(*late_reader, 0);
    let snapshot = gate.snapshot();
    assert_eq!(snapshot.active_readers, 2);
    assert_eq!(snapshot.waiting_writers, 1);

    drop(first_reader);
    drop(late_reader);
    writer.join().expect("writer");
    assert_eq!(*gate.read(), 1);
}

#[test]
fn withdrawn_writer_releases_held_back_readers() {
    // A round only counts once the late reader queued behind the waiting
    // writer; a slow scheduler gets a longer writer deadline next time.
    for patience_ms in [200, 1_000, 5_000] {
        if withdrawn_writer_round(Duration::from_millis(patience_ms)) {
            return;
        }
    }
    panic!("late reader never queued behind the waiting writer");
}

fn withdrawn_writer_round(patience: Duration) -> bool {
    let gate = Arc::new(AccessGate::new((), Priority::WriterPreference));
    let first_reader = gate.read();

    let writer = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            let deadline = Instant::now() + patience;
            gate.write_until(deadline).map(drop)
        })
    };
    wait_for(|| gate.snapshot().waiting_writers == 1 || writer.is_finished());

    let late_reader = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || drop(gate.read()))
    };
    let mut queued = false;
    wait_for(|| {
        queued = gate.snapshot().waiting_readers == 1;
        queued || writer.is_finished()
    });

    assert_eq!(writer.join().expect("writer"), Err(CoordError::TimedOut));
    // The late reader gets in while the first reader is still inside.
    late_reader.join().expect("late reader");
    assert_eq!(gate.snapshot().active_readers, 1);
    drop(first_reader);
    let snapshot = gate.snapshot();
    assert_eq!(snapshot.waiting_writers, 0);
    assert_eq!(snapshot.waiting_readers, 0);
    queued
}

#[test]
fn catalog_updates_are_visible_to_next_reader() {
    let catalog = (1..=100)
        .map(|id| Record::new(id, 10.0, 20))
        .collect::<Catalog>();
    let gate = Arc::new(catalog.into_gate(Priority::WriterPreference));

    let writer = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            let mut catalog = gate.write();
            for index in 0..catalog.len() {
                catalog.adjust(index, 50.0, -5).expect("record");
            }
        })
    };
    writer.join().expect("writer");

    let catalog = gate.read();
    assert!(catalog
        .records()
        .iter()
        .all(|record| record.stock == 15 && (record.price - 15.0).abs() < 1e-9));
    assert_eq!(catalog.total_stock(), 1_500);
}
