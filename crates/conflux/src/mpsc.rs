//! Multi-producer single-consumer queues: a bounded ring and an
//! unbounded linked list.

use crate::fifo::{alloc_slots, check_bits, ring_len, Fifo, Slot};
use crate::invariants::debug_assert_monotonic;
use crossbeam_utils::CachePadded;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

/// Bounded 2^N ring for any number of producer threads and exactly one
/// consumer thread.
///
/// Producers linearise on a `fetch_add` of the tail sequence: the claimed
/// slot is theirs alone, and delivery order matches the claim order. A
/// claimed slot that is still `valid` means the ring is full; the
/// producer backs the counter out and reports failure. Backed-out
/// counters can transiently overshoot under contention; producers that
/// observe `valid == true` always fail, never corrupt, and the counter
/// self-heals as the consumer drains.
pub struct Ring<T> {
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    mask: usize,
    slots: Box<[Slot<T>]>,
}

// SAFETY: slot contents are published and reclaimed exclusively through
// the per-slot `valid` flag (Release store after write, Acquire load
// before read), and a slot is owned by exactly one side at a time.
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
        Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            mask: (1usize << bits) - 1,
            slots: alloc_slots(bits),
        }
    }

    /// Ring capacity in slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Enqueues `item`; hands it back if the ring is full.
    ///
    /// Any thread may call this.
    pub fn push(&self, item: T) -> Result<(), T> {
        let seq = self.tail.fetch_add(1, Ordering::AcqRel);
        let slot = &self.slots[seq as usize & self.mask];

        if slot.valid.load(Ordering::Acquire) {
            // Full: we lapped the consumer. Back the claim out; if this
            // races with another producer the counter overshoots and
            // heals once the consumer catches up.
            self.tail.fetch_sub(1, Ordering::AcqRel);
            return Err(item);
        }

        // SAFETY: we own the claimed slot until we flip `valid`; the
        // consumer does not read a slot whose flag is false.
        unsafe {
            (*slot.value.get()).write(item);
        }
        slot.valid.store(true, Ordering::Release);
        Ok(())
    }

    /// Dequeues the oldest item. Consumer thread only.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let slot = &self.slots[head as usize & self.mask];

        if !slot.valid.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: the Acquire load of `valid` synchronised with the
        // producer's Release store, so the value is fully written; only
        // this consumer invalidates slots.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.valid.store(false, Ordering::Release);

        let old = self.head.fetch_add(1, Ordering::AcqRel);
        debug_assert_monotonic!("head", head, old.wrapping_add(1));
        Some(value)
    }

    /// Copies the oldest item without dequeuing it. Consumer thread only.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Relaxed);
        let slot = &self.slots[head as usize & self.mask];

        if !slot.valid.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: as in `pop`; the slot stays valid because only this
        // consumer thread clears flags.
        Some(unsafe { (*slot.value.get()).assume_init_ref().clone() })
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
        for slot in self.slots.iter_mut() {
            if *slot.valid.get_mut() {
                // SAFETY: a valid flag marks an initialized value and
                // `&mut self` rules out concurrent access.
                unsafe {
                    ptr::drop_in_place((*slot.value.get()).as_mut_ptr());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------
// Unbounded linked list
// ---------------------------------------------------------------------

struct Node<T> {
    value: MaybeUninit<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Self {
        Box::into_raw(Box::new(Self {
            value: MaybeUninit::uninit(),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    fn with_value(value: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value: MaybeUninit::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Unbounded linked queue for any number of producer threads and exactly
/// one consumer thread.
///
/// A sentinel node is kept at the head; its value slot is vacant and the
/// consumer reads `head.next`. Push swaps the tail pointer to the new
/// node and then links the previous tail to it. Between the swap and the
/// link the new node is the tail but not yet reachable from the head;
/// the consumer treats that window as "empty for now".
pub struct LinkedList<T> {
    /// Sentinel pointer; written only by the consumer.
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    len: AtomicUsize,
}

// SAFETY: nodes transfer between threads through the atomic `tail` swap
// and `next` link; a node is freed only by the single consumer after it
// has advanced past it.
unsafe impl<T: Send> Send for LinkedList<T> {}
unsafe impl<T: Send> Sync for LinkedList<T> {}

impl<T> LinkedList<T> {
    pub fn new() -> Self {
        let sentinel = Node::sentinel();
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            len: AtomicUsize::new(0),
        }
    }

    /// Enqueues `item`. Never fails; allocation is infallible-or-abort.
    ///
    /// Any thread may call this.
    pub fn push(&self, item: T) {
        let node = Node::with_value(item);
        let prev = self.tail.swap(node, Ordering::AcqRel);
        // SAFETY: `prev` is the node we displaced as tail. The sentinel
        // discipline guarantees the consumer never frees the current
        // tail, so `prev` is alive until this link lands.
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Dequeues the oldest item. Consumer thread only.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: `head` is the sentinel, owned by this consumer.
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }

        // SAFETY: `next` was fully written before the producer's Release
        // link. Moving the value out turns `next` into the new sentinel
        // (its value slot is henceforth vacant); the old sentinel is ours
        // to free because it is no longer the tail of any producer swap.
        let value = unsafe { ptr::read((*next).value.as_ptr()) };
        self.head.store(next, Ordering::Relaxed);
        drop(unsafe { Box::from_raw(head) });

        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(value)
    }

    /// Copies the oldest item without dequeuing it. Consumer thread only.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: sentinel owned by this consumer; a linked `next` is
        // fully written and stays alive until this consumer pops it.
        unsafe {
            let next = (*head).next.load(Ordering::Acquire);
            if next.is_null() {
                None
            } else {
                Some((*next).value.assume_init_ref().clone())
            }
        }
    }

    /// Advisory item count. Counter-based: pushes count themselves
    /// before the node becomes reachable, so this can briefly run ahead
    /// of what `pop` sees.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Advisory emptiness check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops every queued item and drops it. Consumer thread only.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Fifo<T> for LinkedList<T> {
    fn push(&self, item: T) -> Result<(), T> {
        LinkedList::push(self, item);
        Ok(())
    }

    fn pop(&self) -> Option<T> {
        LinkedList::pop(self)
    }

    fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        LinkedList::peek(self)
    }

    fn clear(&self) {
        LinkedList::clear(self);
    }

    fn len(&self) -> usize {
        LinkedList::len(self)
    }
}

impl<T> Drop for LinkedList<T> {
    fn drop(&mut self) {
        // First node is the sentinel: free without dropping a value.
        let sentinel = *self.head.get_mut();
        // SAFETY: `&mut self` means no other thread holds any node.
        let mut node = unsafe {
            let next = (*sentinel).next.load(Ordering::Relaxed);
            drop(Box::from_raw(sentinel));
            next
        };
        while !node.is_null() {
            // SAFETY: every reachable non-sentinel node holds an
            // initialized value.
            unsafe {
                let mut boxed = Box::from_raw(node);
                ptr::drop_in_place(boxed.value.as_mut_ptr());
                node = *boxed.next.get_mut();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_full_rejects() {
        let ring = Ring::<u32>::new(2); // capacity 4
        for i in 0..4 {
            assert!(ring.push(i).is_ok());
        }
        assert_eq!(ring.push(4), Err(4));
        assert_eq!(ring.pop(), Some(0));
        assert!(ring.push(4).is_ok());
    }

    #[test]
    fn test_ring_fifo_order() {
        let ring = Ring::<u32>::new(4);
        for i in 0..10 {
            ring.push(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(ring.pop(), Some(i));
        }
        assert!(ring.pop().is_none());
    }

    #[test]
    fn test_ring_peek() {
        let ring = Ring::<u32>::new(2);
        assert_eq!(ring.peek(), None);
        ring.push(7).unwrap();
        assert_eq!(ring.peek(), Some(7));
        assert_eq!(ring.pop(), Some(7));
    }

    #[test]
    fn test_list_round_trip() {
        let list = LinkedList::<u32>::new();
        assert!(list.is_empty());
        assert_eq!(list.pop(), None);

        for i in 0..100 {
            list.push(i);
        }
        assert_eq!(list.len(), 100);
        assert_eq!(list.peek(), Some(0));
        for i in 0..100 {
            assert_eq!(list.pop(), Some(i));
        }
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_drop_releases_nodes() {
        use std::sync::atomic::AtomicUsize;

        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROPS.store(0, Ordering::SeqCst);
        {
            let list = LinkedList::<Tracked>::new();
            for _ in 0..10 {
                list.push(Tracked);
            }
            let _ = list.pop();
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 10);
    }
}
