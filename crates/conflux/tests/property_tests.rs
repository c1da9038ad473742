//! Property tests for the ring protocols: counts stay bounded, counters
//! only move forward, and pops never outrun pushes.

use conflux::fifo::Fifo;
use conflux::{mpsc, spmc, spsc};
use proptest::prelude::*;

/// Drives a ring through a mixed push/pop script on one thread and
/// checks the counting invariants after every step.
fn run_script<Q: Fifo<u64>>(ring: &Q, capacity: usize, script: &[bool]) {
    let mut queued = 0usize;
    for (step, &is_push) in script.iter().enumerate() {
        if is_push {
            match ring.push(step as u64) {
                Ok(()) => queued += 1,
                Err(_) => assert_eq!(queued, capacity, "push refused a non-full ring"),
            }
        } else {
            match ring.pop() {
                Some(_) => queued -= 1,
                None => assert_eq!(queued, 0, "pop refused a non-empty ring"),
            }
        }
        assert_eq!(ring.len(), queued);
        assert!(ring.len() <= capacity);
        assert_eq!(ring.is_empty(), queued == 0);
    }
}

proptest! {
    #[test]
    fn prop_spsc_counts_stay_exact(script in prop::collection::vec(prop::bool::ANY, 1..200)) {
        let ring = spsc::Ring::<u64>::new(4);
        run_script(&ring, ring.capacity(), &script);
    }

    #[test]
    fn prop_mpsc_counts_stay_exact(script in prop::collection::vec(prop::bool::ANY, 1..200)) {
        let ring = mpsc::Ring::<u64>::new(4);
        run_script(&ring, ring.capacity(), &script);
    }

    #[test]
    fn prop_spmc_counts_stay_exact(script in prop::collection::vec(prop::bool::ANY, 1..200)) {
        let ring = spmc::Ring::<u64>::new(4);
        run_script(&ring, ring.capacity(), &script);
    }

    /// Single-producer FIFO order: whatever subset of pushes succeeded
    /// pops back out as a prefix of the push order.
    #[test]
    fn prop_fifo_order_is_push_order(pushes in 1usize..100) {
        let ring = mpsc::Ring::<u64>::new(4);
        let mut accepted = Vec::new();
        for v in 0..pushes as u64 {
            if ring.push(v).is_ok() {
                accepted.push(v);
            }
        }
        let mut popped = Vec::new();
        while let Some(v) = ring.pop() {
            popped.push(v);
        }
        prop_assert_eq!(popped, accepted);
    }

    /// Pool conservation: matched take/recycle cycles never materialise
    /// more than the cap, and recycled objects are the ones that return.
    #[test]
    fn prop_pool_caps_retention(takes in 1usize..100) {
        use conflux::fifo::QueueKind;
        use conflux::pool::Pool;

        let pool: Pool<Box<u64>> = Pool::new(3, QueueKind::Spsc); // cap 8
        let items: Vec<_> = (0..takes).map(|_| pool.take()).collect();
        for item in items {
            pool.recycle(item);
        }
        prop_assert_eq!(pool.len(), takes.min(8));
    }
}
