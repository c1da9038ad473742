//! Conflation queue: a FIFO of keys over a trie of latest values.
//!
//! Duplicate keys in the pipeline collapse to the most recent value
//! while the queue position of the *first* arrival is kept: pop order
//! is first-arrival order, pop values are latest values. The trie is
//! the coalescing buffer, the FIFO preserves arrival order, and a pool
//! recycles the fixed-size key handles that travel through the FIFO.

use crate::fifo::{AnyRing, Fifo, QueueKind};
use crate::key::{serialize, Keyed, TrieKey, MAX_KEY_WIDTH};
use crate::pool::Pool;
use crate::trie::Trie;
use thiserror::Error;

/// Heap-owned serialized key travelling through the FIFO; only the
/// first `Key::WIDTH` bytes are live.
type KeyHandle = Box<[u8; MAX_KEY_WIDTH]>;

/// Errors from conflation queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflationError {
    /// The key queue is full. The value was still conflated into the
    /// map, but its key could not be enqueued.
    #[error("key queue is full")]
    QueueFull,
}

/// Configuration for a [`ConflationQueue`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Key FIFO capacity as a power of two (default: 10 = 1024 keys).
    pub queue_bits: u8,
    /// Producer/consumer discipline of the key FIFO (default: MPSC).
    pub kind: QueueKind,
    /// Key handle pool cap as a power of two (default: 10).
    pub pool_bits: u8,
}

impl Config {
    /// Creates a configuration with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if either exponent is 0 or greater than 20.
    pub const fn new(queue_bits: u8, kind: QueueKind, pool_bits: u8) -> Self {
        assert!(
            queue_bits >= 1 && queue_bits <= 20,
            "queue_bits must be between 1 and 20"
        );
        assert!(
            pool_bits >= 1 && pool_bits <= 20,
            "pool_bits must be between 1 and 20"
        );
        Self {
            queue_bits,
            kind,
            pool_bits,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_bits: 10,
            kind: QueueKind::Mpsc,
            pool_bits: 10,
        }
    }
}

/// Small single-producer queue that stays cache-resident (256 keys).
pub const LOW_LATENCY_CONFIG: Config = Config::new(8, QueueKind::Spsc, 6);

/// Large fan-in queue for bursty multi-producer feeds (16K keys).
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(14, QueueKind::Mpsc, 12);

/// FIFO of keys + trie of values + pool of key handles.
///
/// A key sits in the FIFO **at most once** while a value for it is
/// present in the trie: `push` upserts the value first and only enqueues
/// the key when the upsert reports a fresh insert. Racing producers of
/// the same key are linearised by the upsert, so exactly one of them
/// enqueues. `len` is the FIFO's length, not the trie's.
///
/// Thread contract follows the configured [`QueueKind`]; e.g. MPSC
/// allows any number of pushing threads and a single popping thread.
pub struct ConflationQueue<T: Keyed> {
    queue: AnyRing<KeyHandle>,
    pool: Pool<KeyHandle>,
    map: Trie<T>,
}

impl<T: Keyed> ConflationQueue<T> {
    const WIDTH: usize = <T::Key as TrieKey>::WIDTH;

    pub fn new(config: Config) -> Self {
        Self {
            queue: AnyRing::new(config.kind, config.queue_bits),
            // Handles are taken by the FIFO's producers and recycled by
            // its consumers, so the pool runs the mirrored discipline.
            pool: Pool::new(config.pool_bits, config.kind.mirror()),
            map: Trie::new(),
        }
    }

    /// Enqueues `item`, conflating on its key.
    ///
    /// If a value for the key is already pending, the new value replaces
    /// it and the queue position stays that of the first arrival. A
    /// `QueueFull` failure strands the value in the map with no queued
    /// key: later pushes of that key keep conflating into the stranded
    /// value without enqueueing it, so it surfaces again only through
    /// [`ConflationQueue::clear`]. Size `queue_bits` to the live key
    /// population so the FIFO cannot fill.
    pub fn push(&self, item: T) -> Result<(), ConflationError> {
        let key = serialize(item.key());
        if self.map.upsert(item) {
            // Key already queued while its value is present.
            return Ok(());
        }

        let mut handle = self.pool.take();
        *handle = key;
        match self.queue.push(handle) {
            Ok(()) => Ok(()),
            Err(handle) => {
                self.pool.recycle(handle);
                Err(ConflationError::QueueFull)
            }
        }
    }

    /// Pops the oldest pending key and returns the value currently
    /// stored for it, which may have been overwritten since the key
    /// was enqueued.
    pub fn pop(&self) -> Option<T> {
        let handle = self.queue.pop()?;
        let value = self.map.remove_bytes(&handle[..Self::WIDTH]);
        self.pool.recycle(handle);
        value
    }

    /// Copies the value pending at the head of the queue.
    ///
    /// The usual peek-vs-pop hazards apply when the discipline has
    /// multiple consumers.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let handle = self.queue.peek()?;
        self.map.get_bytes(&handle[..Self::WIDTH])
    }

    /// Visits every pending value (trie traversal, byte-lexicographic
    /// key order, not arrival order).
    pub fn for_each<F>(&self, f: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.map.for_each(f)
    }

    /// Number of pending keys (advisory).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` if no key is pending (advisory).
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Key FIFO capacity.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Drains the key FIFO (recycling handles) and tears down the trie.
    /// Exclusive access required.
    pub fn clear(&mut self) {
        while let Some(handle) = self.queue.pop() {
            self.pool.recycle(handle);
        }
        self.map.clear();
    }
}
