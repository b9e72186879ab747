//! Pairwise acquisition around the ring under real threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use coord::{ActorState, CoordError, ResourceRing};

fn wait_for(mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !predicate() {
        assert!(Instant::now() < deadline, "condition never became true");
        thread::yield_now();
    }
}

#[test]
fn non_adjacent_actors_hold_pairs_together() {
    let ring = Arc::new(ResourceRing::new(5).expect("ring"));
    ring.acquire_pair(0).expect("actor 0");
    ring.acquire_pair(2).expect("actor 2");
    let snapshot = ring.snapshot();
    assert_eq!(snapshot.active_count(), 2);
    assert_eq!(snapshot.holders, vec![Some(0), Some(0), Some(2), Some(2), None]);

    let waiter = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || ring.acquire_pair(1))
    };
    wait_for(|| ring.state_of(1) == Ok(ActorState::Waiting));

    // Actor 1 needs units 1 and 2; freeing unit 1 alone is not enough.
    ring.release_pair(0).expect("release 0");
    assert_eq!(ring.state_of(1), Ok(ActorState::Waiting));
    assert!(!waiter.is_finished());

    ring.release_pair(2).expect("release 2");
    waiter.join().expect("join").expect("actor 1 granted");
    assert_eq!(ring.state_of(1), Ok(ActorState::Active));
    assert_eq!(ring.snapshot().holders, vec![None, Some(1), Some(1), None, None]);
    ring.release_pair(1).expect("release 1");
}

#[test]
fn release_unblocks_waiting_neighbor() {
    let ring = Arc::new(ResourceRing::new(5).expect("ring"));
    ring.acquire_pair(0).expect("actor 0");
    let waiter = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || ring.acquire_pair(1))
    };
    wait_for(|| ring.state_of(1) == Ok(ActorState::Waiting));
    ring.release_pair(0).expect("release 0");
    waiter.join().expect("join").expect("actor 1 granted");
    assert_eq!(ring.snapshot().holders[1..3], [Some(1), Some(1)]);
}

#[test]
fn all_actors_requesting_at_once_make_progress() {
    const ACTORS: usize = 5;
    const SESSIONS: usize = 200;

    let ring = Arc::new(ResourceRing::new(ACTORS).expect("ring"));
    let start = Arc::new(Barrier::new(ACTORS));
    let violations = Arc::new(AtomicUsize::new(0));

    let handles = (0..ACTORS)
        .map(|actor| {
            let ring = Arc::clone(&ring);
            let start = Arc::clone(&start);
            let violations = Arc::clone(&violations);
            thread::spawn(move || {
                start.wait();
                for _ in 0..SESSIONS {
                    ring.acquire_pair(actor).expect("acquire");
                    let snapshot = ring.snapshot();
                    if snapshot.has_adjacent_active() || snapshot.active_count() > ACTORS / 2 {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    thread::yield_now();
                    ring.release_pair(actor).expect("release");
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().expect("actor thread");
    }
    assert_eq!(violations.load(Ordering::Relaxed), 0);

    let snapshot = ring.snapshot();
    assert!(snapshot.actors.iter().all(|state| *state == ActorState::Idle));
    assert!(snapshot.holders.iter().all(Option::is_none));
    assert!(snapshot.grants.iter().all(|grants| *grants == SESSIONS as u64));
}

#[test]
fn two_seat_ring_alternates() {
    let ring = Arc::new(ResourceRing::new(2).expect("ring"));
    let handles = (0..2)
        .map(|actor| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for _ in 0..500 {
                    let _lease = ring.lease(actor).expect("lease");
                    assert_eq!(ring.snapshot().active_count(), 1);
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("actor thread");
    }
    assert_eq!(ring.snapshot().grants, vec![500, 500]);
}

#[test]
fn timed_out_waiter_does_not_block_others() {
    let ring = Arc::new(ResourceRing::new(5).expect("ring"));
    ring.acquire_pair(1).expect("actor 1");

    let deadline = Instant::now() + Duration::from_millis(30);
    assert_eq!(ring.acquire_pair_until(2, deadline), Err(CoordError::TimedOut));

    // Actor 3 shares nothing with actor 1 and is free to go.
    ring.acquire_pair(3).expect("actor 3");
    ring.release_pair(1).expect("release 1");
    ring.release_pair(3).expect("release 3");
    ring.acquire_pair(2).expect("actor 2 after timeout");
    ring.release_pair(2).expect("release 2");
}

#[test]
fn unknown_actor_is_rejected() {
    let ring = ResourceRing::new(3).expect("ring");
    assert_eq!(
        ring.acquire_pair(3),
        Err(CoordError::UnknownActor { actor: 3, size: 3 })
    );
    assert!(matches!(
        ResourceRing::new(0),
        Err(CoordError::InvalidConfig(_))
    ));
}
