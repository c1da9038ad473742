//! Cross-thread hammer tests for the four concurrent queue disciplines.

use conflux::fifo::Fifo;
use conflux::{mpsc, spmc};
use std::hint;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const PER_PRODUCER: u64 = 5_000;
const PRODUCERS: u64 = 4;
const FAN_OUT_TOTAL: u64 = 20_000;
const CONSUMERS: usize = 4;

/// Escalating wait between retries: a few PAUSE spins first, then a
/// scheduler yield once the other side is clearly not keeping up.
fn pause(attempt: u32) {
    if attempt < 8 {
        for _ in 0..(1 << attempt) {
            hint::spin_loop();
        }
    } else {
        thread::yield_now();
    }
}

/// Encodes (producer id, sequence) so the consumer can check
/// per-producer order.
fn encode(producer: u64, seq: u64) -> u64 {
    producer * 1_000_000 + seq
}

fn push_until_accepted<Q: Fifo<u64>>(queue: &Q, value: u64) {
    let mut attempt = 0;
    while queue.push(value).is_err() {
        pause(attempt);
        attempt += 1;
    }
}

#[test]
fn mpsc_ring_fan_in_preserves_per_producer_order() {
    let ring = mpsc::Ring::<u64>::new(10);
    let mut popped = Vec::with_capacity((PRODUCERS * PER_PRODUCER) as usize);

    thread::scope(|s| {
        for p in 0..PRODUCERS {
            let ring = &ring;
            s.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    push_until_accepted(ring, encode(p, seq));
                }
            });
        }

        let mut attempt = 0;
        while popped.len() < (PRODUCERS * PER_PRODUCER) as usize {
            match ring.pop() {
                Some(v) => {
                    popped.push(v);
                    attempt = 0;
                }
                None => {
                    pause(attempt);
                    attempt += 1;
                }
            }
        }
    });

    assert_eq!(popped.len(), 20_000);

    // Each producer's sequence must appear as a subsequence of the pops.
    let mut next_seq = [0u64; PRODUCERS as usize];
    for v in popped {
        let producer = (v / 1_000_000) as usize;
        let seq = v % 1_000_000;
        assert_eq!(
            seq, next_seq[producer],
            "producer {producer} out of order"
        );
        next_seq[producer] += 1;
    }
    assert!(next_seq.iter().all(|&n| n == PER_PRODUCER));
}

#[test]
fn spmc_ring_fan_out_delivers_each_item_once() {
    let ring = spmc::Ring::<u64>::new(10);
    let popped_total = AtomicUsize::new(0);

    let mut per_consumer: Vec<Vec<u64>> = Vec::new();
    thread::scope(|s| {
        let mut handles = Vec::new();
        for _ in 0..CONSUMERS {
            let ring = &ring;
            let popped_total = &popped_total;
            handles.push(s.spawn(move || {
                let mut mine = Vec::new();
                let mut attempt = 0;
                while popped_total.load(Ordering::Acquire) < FAN_OUT_TOTAL as usize {
                    match ring.pop() {
                        Some(v) => {
                            mine.push(v);
                            popped_total.fetch_add(1, Ordering::AcqRel);
                            attempt = 0;
                        }
                        None => {
                            pause(attempt);
                            attempt += 1;
                        }
                    }
                }
                mine
            }));
        }

        for v in 0..FAN_OUT_TOTAL {
            push_until_accepted(&ring, v);
        }

        for handle in handles {
            per_consumer.push(handle.join().unwrap());
        }
    });

    // Every value exactly once across all consumers, and each consumer's
    // own observations in push order.
    let mut seen = vec![false; FAN_OUT_TOTAL as usize];
    for mine in &per_consumer {
        let mut last = None;
        for &v in mine {
            assert!(!seen[v as usize], "value {v} popped twice");
            seen[v as usize] = true;
            assert!(
                last.map_or(true, |l| l < v),
                "consumer saw {v} after {last:?}"
            );
            last = Some(v);
        }
    }
    assert!(seen.iter().all(|&s| s), "some value was never popped");
}

#[test]
fn mpsc_list_fan_in_preserves_per_producer_order() {
    let list = mpsc::LinkedList::<u64>::new();
    let mut popped = Vec::with_capacity((PRODUCERS * PER_PRODUCER) as usize);

    thread::scope(|s| {
        for p in 0..PRODUCERS {
            let list = &list;
            s.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    list.push(encode(p, seq));
                }
            });
        }

        let mut attempt = 0;
        while popped.len() < (PRODUCERS * PER_PRODUCER) as usize {
            match list.pop() {
                Some(v) => {
                    popped.push(v);
                    attempt = 0;
                }
                None => {
                    pause(attempt);
                    attempt += 1;
                }
            }
        }
    });

    let mut next_seq = [0u64; PRODUCERS as usize];
    for v in popped {
        let producer = (v / 1_000_000) as usize;
        let seq = v % 1_000_000;
        assert_eq!(seq, next_seq[producer]);
        next_seq[producer] += 1;
    }
    assert!(next_seq.iter().all(|&n| n == PER_PRODUCER));
}

#[test]
fn spmc_list_fan_out_delivers_each_item_once() {
    let list = spmc::LinkedList::<u64>::new();
    let popped_total = AtomicUsize::new(0);

    let mut per_consumer: Vec<Vec<u64>> = Vec::new();
    thread::scope(|s| {
        let mut handles = Vec::new();
        for _ in 0..CONSUMERS {
            let list = &list;
            let popped_total = &popped_total;
            handles.push(s.spawn(move || {
                let mut mine = Vec::new();
                let mut attempt = 0;
                while popped_total.load(Ordering::Acquire) < FAN_OUT_TOTAL as usize {
                    match list.pop() {
                        Some(v) => {
                            mine.push(v);
                            popped_total.fetch_add(1, Ordering::AcqRel);
                            attempt = 0;
                        }
                        None => {
                            pause(attempt);
                            attempt += 1;
                        }
                    }
                }
                mine
            }));
        }

        for v in 0..FAN_OUT_TOTAL {
            list.push(v);
        }

        for handle in handles {
            per_consumer.push(handle.join().unwrap());
        }
    });

    let mut seen = vec![false; FAN_OUT_TOTAL as usize];
    for mine in &per_consumer {
        for &v in mine {
            assert!(!seen[v as usize], "value {v} popped twice");
            seen[v as usize] = true;
        }
    }
    assert!(seen.iter().all(|&s| s), "some value was never popped");
}

#[test]
fn spsc_ring_two_thread_stream() {
    let ring = conflux::spsc::Ring::<u64>::new(8);
    const COUNT: u64 = 100_000;

    thread::scope(|s| {
        let producer = {
            let ring = &ring;
            s.spawn(move || {
                for v in 0..COUNT {
                    push_until_accepted(ring, v);
                }
            })
        };

        let mut expected = 0;
        let mut attempt = 0;
        while expected < COUNT {
            match ring.pop() {
                Some(v) => {
                    assert_eq!(v, expected);
                    expected += 1;
                    attempt = 0;
                }
                None => {
                    pause(attempt);
                    attempt += 1;
                }
            }
        }
        producer.join().unwrap();
    });

    assert!(ring.is_empty());
}
