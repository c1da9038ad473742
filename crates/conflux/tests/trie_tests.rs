//! Volume and concurrency tests for the trie.
//!
//! Bulk tests use 16-bit keys: a dense 64-bit keyspace would materialise
//! a branch chain per key, and the point here is cell behaviour, not
//! allocator throughput. The deep-descent path is covered by the
//! 64-bit-keyed tests with modest key counts.

use conflux::{Keyed, Trie};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[derive(Clone, Debug, PartialEq)]
struct Blob {
    when: u64,
}

impl Keyed for Blob {
    type Key = u64;
    fn key(&self) -> u64 {
        self.when
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Reading {
    sensor: u16,
    value: u32,
}

impl Keyed for Reading {
    type Key = u16;
    fn key(&self) -> u16 {
        self.sensor
    }
}

#[test]
fn bulk_insert_get_and_traverse() {
    const COUNT: u16 = 65_535;
    let trie = Trie::new();

    for sensor in 0..COUNT {
        trie.insert(Reading { sensor, value: 0 });
    }
    assert_eq!(trie.len(), COUNT as usize);

    for sensor in 0..COUNT {
        assert!(trie.get(sensor).is_some(), "missing key {sensor}");
    }

    let mut visited = 0u32;
    assert!(trie.for_each(|_| {
        visited += 1;
        true
    }));
    assert_eq!(visited, u32::from(COUNT));
}

#[test]
fn parallel_disjoint_inserts() {
    const PER_THREAD: u16 = 10_000;
    const THREADS: u16 = 4;
    let trie = Trie::new();

    thread::scope(|s| {
        for t in 0..THREADS {
            let trie = &trie;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    trie.insert(Reading {
                        sensor: t * PER_THREAD + i,
                        value: u32::from(t),
                    });
                }
            });
        }
    });

    assert_eq!(trie.len(), usize::from(THREADS) * usize::from(PER_THREAD));
    for k in 0..THREADS * PER_THREAD {
        assert!(trie.contains_key(k), "missing key {k}");
    }
}

#[test]
fn racing_upserts_crown_exactly_one_inserter() {
    let trie = Trie::new();
    let inserts = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            let trie = &trie;
            let inserts = &inserts;
            s.spawn(move || {
                if !trie.upsert(Blob { when: 42 }) {
                    inserts.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    // All eight upserted the same key; exactly one saw a fresh cell.
    assert_eq!(inserts.load(Ordering::SeqCst), 1);
    assert_eq!(trie.len(), 1);
}

#[test]
fn deep_descent_round_trip() {
    let trie = Trie::new();
    // 64-bit keys spread across all eight byte positions.
    let keys: Vec<u64> = (0..500u64)
        .map(|i| i.wrapping_mul(0x0101_0101_0101_0101))
        .collect();

    for &k in &keys {
        trie.insert(Blob { when: k });
    }
    assert_eq!(trie.len(), keys.len());
    for &k in &keys {
        assert_eq!(trie.get(k), Some(Blob { when: k }));
    }
}

#[test]
fn remove_interleaved_with_reads() {
    let trie = Trie::new();
    for i in 0..1_000u64 {
        trie.insert(Blob { when: i });
    }

    thread::scope(|s| {
        let remover = {
            let trie = &trie;
            s.spawn(move || {
                for i in 0..1_000u64 {
                    assert_eq!(trie.remove(i), Some(Blob { when: i }));
                }
            })
        };

        let trie = &trie;
        s.spawn(move || {
            // Reads racing removals may or may not find the key, but must
            // never see a torn value.
            for i in 0..1_000u64 {
                if let Some(blob) = trie.get(i) {
                    assert_eq!(blob.when, i);
                }
            }
        });

        remover.join().unwrap();
    });

    assert!(trie.is_empty());
    // Idempotent: removing removed keys returns None.
    for i in 0..1_000u64 {
        assert_eq!(trie.remove(i), None);
    }
}
