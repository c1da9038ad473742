//! Single-producer single-consumer bounded ring.

use crate::fifo::{check_bits, ring_len, Fifo};
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_monotonic,
};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

// Synchronisation protocol
// ------------------------
//
// Unbounded u64 sequence numbers for `head` and `tail`; a slot index is
// `sequence & mask`, computed only at access time. The counters cannot
// wrap in practice, which rules out ABA on the indices.
//
// Producer: Relaxed-load own `tail`, consult the cached head mirror, and
// only on apparent fullness Acquire-load `head` (synchronises with the
// consumer's Release store). Write the slot, then Release-store `tail`
// to publish it.
//
// Consumer: mirror image with `head` and the cached tail.
//
// The mirrors and the buffer go through `UnsafeCell` without atomics
// because each has exactly one writing thread under the SPSC contract.

/// Bounded 2^N ring for exactly one producer thread and exactly one
/// consumer thread.
///
/// `push` may be called by one thread and `pop`/`peek`/`clear` by one
/// (possibly different) thread. No operation blocks; a full ring rejects
/// the push and an empty ring returns `None`.
pub struct Ring<T> {
    /// Next write sequence (written by producer, read by consumer).
    tail: CachePadded<AtomicU64>,
    /// Producer's cached view of `head`, avoids cross-core reads.
    cached_head: CachePadded<UnsafeCell<u64>>,
    /// Next read sequence (written by consumer, read by producer).
    head: CachePadded<AtomicU64>,
    /// Consumer's cached view of `tail`.
    cached_tail: CachePadded<UnsafeCell<u64>>,
    mask: usize,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: the counters are atomics and every buffer slot has a single
// writer at any moment under the one-producer/one-consumer contract; the
// Release/Acquire pairing on the counters publishes slot contents.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Creates a ring with `2^bits` slots.
    ///
    /// # Panics
    ///
    /// Panics if `bits` is 0 or greater than 20.
    pub fn new(bits: u8) -> Self {
        check_bits(bits);
        let capacity = 1usize << bits;
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, || UnsafeCell::new(MaybeUninit::uninit()));

        Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            cached_head: CachePadded::new(UnsafeCell::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            cached_tail: CachePadded::new(UnsafeCell::new(0)),
            mask: capacity - 1,
            buffer: buffer.into_boxed_slice(),
        }
    }

    /// Ring capacity in slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Enqueues `item`; hands it back if the ring is full.
    ///
    /// Producer thread only.
    pub fn push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);

        // SAFETY: the cached head mirror is written only on this (the
        // producer's) code path, so the unsynchronised access is sound.
        let mut head = unsafe { *self.cached_head.get() };
        if tail.wrapping_sub(head) as usize >= self.capacity() {
            head = self.head.load(Ordering::Acquire);
            // SAFETY: as above; the Acquire load just synchronised the
            // mirror with the consumer's Release store.
            unsafe { *self.cached_head.get() = head };
            if tail.wrapping_sub(head) as usize >= self.capacity() {
                return Err(item);
            }
        }

        // SAFETY: the slot at `tail` is outside [head, tail), so the
        // consumer is not reading it, and only the producer writes slots.
        unsafe {
            (*self.buffer[tail as usize & self.mask].get()).write(item);
        }

        let new_tail = tail.wrapping_add(1);
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_bounded_count!(new_tail.wrapping_sub(head) as usize, self.capacity());
        self.tail.store(new_tail, Ordering::Release);
        Ok(())
    }

    /// Dequeues the oldest item. Consumer thread only.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        self.available(head)?;

        // SAFETY: slots in [head, tail) were published by the producer's
        // Release store of `tail`, which the Acquire load in `available`
        // synchronised with; ownership of the value moves out here and
        // the slot becomes writable once `head` advances.
        let value = unsafe {
            (*self.buffer[head as usize & self.mask].get()).assume_init_read()
        };

        let new_head = head.wrapping_add(1);
        debug_assert_monotonic!("head", head, new_head);
        self.head.store(new_head, Ordering::Release);
        Some(value)
    }

    /// Copies the oldest item without dequeuing it. Consumer thread only.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Relaxed);
        self.available(head)?;

        // SAFETY: as in `pop`, but the value stays in place; only this
        // consumer thread can invalidate the slot, and it is not doing so.
        let value = unsafe {
            (*self.buffer[head as usize & self.mask].get())
                .assume_init_ref()
                .clone()
        };
        Some(value)
    }

    /// Returns `Some(())` if at least one item is readable at `head`,
    /// refreshing the cached tail mirror when it looks empty.
    #[inline]
    fn available(&self, head: u64) -> Option<()> {
        // SAFETY: the cached tail mirror is written only on the
        // consumer's code paths.
        let mut tail = unsafe { *self.cached_tail.get() };
        if tail == head {
            tail = self.tail.load(Ordering::Acquire);
            // SAFETY: as above.
            unsafe { *self.cached_tail.get() = tail };
            if tail == head {
                return None;
            }
        }
        debug_assert_head_not_past_tail!(head, tail);
        Some(())
    }

    /// Advisory item count.
    #[inline]
    pub fn len(&self) -> usize {
        ring_len(
            self.head.load(Ordering::Relaxed),
            self.tail.load(Ordering::Relaxed),
            self.capacity(),
        )
    }

    /// Advisory emptiness check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    /// Pops every queued item and drops it. Consumer thread only.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl<T> Fifo<T> for Ring<T> {
    fn push(&self, item: T) -> Result<(), T> {
        Ring::push(self, item)
    }

    fn pop(&self) -> Option<T> {
        Ring::pop(self)
    }

    fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        Ring::peek(self)
    }

    fn clear(&self) {
        Ring::clear(self);
    }

    fn len(&self) -> usize {
        Ring::len(self)
    }

    fn is_empty(&self) -> bool {
        Ring::is_empty(self)
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;

        for i in 0..count {
            let idx = (head as usize).wrapping_add(i) & self.mask;
            // SAFETY: slots in [head, tail) hold initialized values and
            // `&mut self` guarantees no concurrent access.
            unsafe {
                ptr::drop_in_place((*self.buffer[idx].get()).as_mut_ptr());
            }
        }
    }
}
