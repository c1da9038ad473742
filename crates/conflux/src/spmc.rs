//! Single-producer multi-consumer queues: a bounded ring and an
//! unbounded linked list.

use crate::fifo::{alloc_slots, check_bits, ring_len, Fifo, Slot};
use crossbeam_utils::CachePadded;
use std::hint;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering};

/// Bounded 2^N ring for exactly one producer thread and any number of
/// consumer threads.
///
/// The producer owns the tail sequence outright (plain store, no RMW) and
/// checks the claimed slot's `valid` flag before overwriting. Consumers
/// contend for the head sequence with compare-exchange; the winner of a
/// given sequence owns that slot's value and clears the flag when done.
pub struct Ring<T> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    mask: usize,
    slots: Box<[Slot<T>]>,
}

// SAFETY: slot handoff goes through the per-slot `valid` flag and the
// head compare-exchange hands each sequence number to exactly one
// consumer.
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
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
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
    /// Producer thread only.
    pub fn push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let slot = &self.slots[tail as usize & self.mask];

        if slot.valid.load(Ordering::Acquire) {
            // The slot one lap behind has not been consumed yet.
            return Err(item);
        }

        // SAFETY: `valid == false` plus the single-producer contract
        // means nobody else touches this slot until we publish it.
        unsafe {
            (*slot.value.get()).write(item);
        }
        slot.valid.store(true, Ordering::Release);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Dequeues the oldest item. Any thread may call this.
    pub fn pop(&self) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let slot = &self.slots[head as usize & self.mask];

            if !slot.valid.load(Ordering::Acquire) {
                return None;
            }

            if self
                .head
                .compare_exchange_weak(
                    head,
                    head.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                // SAFETY: winning the compare-exchange for `head` hands
                // this sequence number (and so this slot's value) to us
                // alone; the producer will not rewrite the slot until the
                // flag is cleared.
                let value = unsafe { (*slot.value.get()).assume_init_read() };
                slot.valid.store(false, Ordering::Release);
                return Some(value);
            }
            // Lost the head race to another consumer; brief pause, retry.
            hint::spin_loop();
        }
    }

    /// Copies the oldest item without dequeuing it.
    ///
    /// With multiple consumers the copy can race a concurrent `pop` of
    /// the same slot; the result is only meaningful on a quiescent queue.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Acquire);
        let slot = &self.slots[head as usize & self.mask];

        if !slot.valid.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the flag was observed valid; see the quiescence caveat
        // in the doc comment for the multi-consumer case.
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

    /// Pops every queued item and drops it.
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
                // SAFETY: valid flag marks an initialized value and
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
    fn with_value(value: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value: MaybeUninit::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Retired-node marker. A consumer CAS-writes this into a node's `next`
/// field before freeing it, so the producer can tell "link onto me" (null)
/// apart from "this tail is gone, re-read" (tombstone).
#[inline]
fn tombstone<T>() -> *mut Node<T> {
    1usize as *mut Node<T>
}

/// Unbounded linked queue for exactly one producer thread and any number
/// of consumer threads.
///
/// No sentinel: an empty list is `head == null`. Push installs the node
/// as the head when the list is empty, otherwise links it after the
/// current tail; the tombstone discipline lets the producer detect a tail
/// that a consumer retired underneath it and fall through to re-read.
pub struct LinkedList<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    /// Written only by the producer.
    tail: CachePadded<AtomicPtr<Node<T>>>,
    len: AtomicUsize,
}

// SAFETY: ownership of each node passes from the producer to exactly one
// consumer through the head compare-exchange; retirement is signalled
// through the tombstoned `next` before the node is freed.
unsafe impl<T: Send> Send for LinkedList<T> {}
unsafe impl<T: Send> Sync for LinkedList<T> {}

impl<T> LinkedList<T> {
    pub fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            tail: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            len: AtomicUsize::new(0),
        }
    }

    /// Enqueues `item`. Producer thread only.
    pub fn push(&self, item: T) {
        let node = Node::with_value(item);
        loop {
            if self
                .head
                .compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // List was empty; the node is both head and tail.
                self.tail.store(node, Ordering::Release);
                break;
            }

            let tail = self.tail.load(Ordering::Acquire);
            if tail.is_null() {
                continue;
            }
            // SAFETY: the tombstone written before any retirement makes
            // this compare-exchange fail rather than link onto a node a
            // consumer is about to free.
            let linked = unsafe {
                (*tail)
                    .next
                    .compare_exchange(ptr::null_mut(), node, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            };
            if linked {
                self.tail.store(node, Ordering::Release);
                break;
            }
            // The tail we held was retired (its `next` is the tombstone);
            // by now the consumers have drained it, so retry from empty.
            hint::spin_loop();
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Dequeues the oldest item. Any thread may call this.
    pub fn pop(&self) -> Option<T> {
        // Claim the head node, remembering whether it looked like the
        // last one in the list.
        let (node, was_last) = loop {
            let head = self.head.load(Ordering::Acquire);
            if head.is_null() {
                return None;
            }
            // SAFETY: a non-null head is alive: the claiming consumer is
            // the one that frees it, and it has not been claimed yet.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            if self
                .head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break (head, next.is_null());
            }
            hint::spin_loop();
        };

        // SAFETY: winning the head compare-exchange makes us the sole
        // owner of `node`.
        let value = unsafe { ptr::read((*node).value.as_ptr()) };

        // Retire: a non-null `next` tells the producer this node is about
        // to be freed. Only a last-position node can race the producer's
        // link; if the tombstone compare-exchange loses that race, the
        // producer linked a successor behind our back; reinstall it as
        // the head so it is not lost.
        // SAFETY: we own `node` until we free it below.
        unsafe {
            if was_last {
                if (*node)
                    .next
                    .compare_exchange(
                        ptr::null_mut(),
                        tombstone(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_err()
                {
                    let successor = (*node).next.load(Ordering::Acquire);
                    let _ = self.head.compare_exchange(
                        ptr::null_mut(),
                        successor,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                }
            } else {
                // Interior node: the producer only ever touches the tail.
                (*node).next.store(tombstone(), Ordering::Release);
            }
            drop(Box::from_raw(node));
        }

        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(value)
    }

    /// Copies the oldest item without dequeuing it.
    ///
    /// Only meaningful on a quiescent queue: another consumer can pop and
    /// free the head while the copy is in flight.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let head = self.head.load(Ordering::Acquire);
        if head.is_null() {
            return None;
        }
        // SAFETY: see the quiescence caveat in the doc comment.
        Some(unsafe { (*head).value.assume_init_ref().clone() })
    }

    /// Advisory item count.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Advisory emptiness check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops every queued item and drops it.
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
        let mut node = *self.head.get_mut();
        while !node.is_null() && node != tombstone() {
            // SAFETY: `&mut self` means no other thread holds any node;
            // every reachable node carries an initialized value.
            unsafe {
                let mut boxed = Box::from_raw(node);
                ptr::drop_in_place(boxed.value.as_mut_ptr());
                node = *boxed.next.get_mut();
            }
        }
    }
}
