//! Capped object pool over a ring of recyclable items.

use crate::fifo::{AnyRing, Fifo, QueueKind};

/// A pool of up to `2^bits` recyclable items backed by a ring of the
/// chosen discipline. Pick the discipline that matches which threads
/// call [`Pool::take`] (the pool's consumers) and [`Pool::recycle`] (its
/// producers).
///
/// [`Pool::take`] hands out a recycled item when one is queued and
/// default-constructs a fresh one otherwise, so it never fails. The pool
/// does not own an item between `take` and `recycle`; a recycle into a
/// full pool drops the item; the pool is capped. Items come
/// back exactly as they were returned: callers needing a clean slate
/// reset state after `take`.
///
/// Heap-owning contents are plain `Box<_>` values (`Box<T>: Default`
/// allocates the fresh slot). Dropping the pool drops everything still
/// queued.
///
/// # Example
///
/// ```
/// use conflux::fifo::QueueKind;
/// use conflux::pool::Pool;
///
/// let pool: Pool<Box<[u8; 32]>> = Pool::new(5, QueueKind::Spsc);
/// let buf = pool.take();     // freshly allocated, pool was empty
/// pool.recycle(buf);         // back in the pool
/// assert_eq!(pool.len(), 1);
/// ```
pub struct Pool<T> {
    queue: AnyRing<T>,
}

impl<T: Default> Pool<T> {
    /// Creates a pool capped at `2^bits` items with the given recycling
    /// discipline.
    ///
    /// # Panics
    ///
    /// Panics if `bits` is 0 or greater than 20.
    pub fn new(bits: u8, kind: QueueKind) -> Self {
        Self {
            queue: AnyRing::new(kind, bits),
        }
    }

    /// Pops a recycled item, or default-constructs a fresh one if the
    /// pool is dry.
    pub fn take(&self) -> T {
        self.queue.pop().unwrap_or_default()
    }

    /// Returns an item to the pool; drops it if the pool is full.
    pub fn recycle(&self, item: T) {
        let _ = self.queue.push(item);
    }

    /// Maximum number of items the pool retains.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of items currently pooled (advisory). Starts at zero and
    /// grows as items are recycled, up to the cap.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` if no recycled item is queued; `take` still works, it just
    /// constructs.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
