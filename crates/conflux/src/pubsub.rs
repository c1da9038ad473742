//! Typed source/sink pub-sub graph.
//!
//! A [`Source<T>`] fans each sent item out to its registered sinks,
//! synchronously on the sending thread. A [`Sink<T>`] is anything that
//! can receive an item; an [`Adapter`] is a sink of one type that
//! forwards through an embedded source of another, forming the
//! composition nodes of a pipeline.
//!
//! Registration is by `Arc` identity and held as weak references:
//! dropping a sink leaves no dangling edge, and the source prunes dead
//! entries as it touches the set. Fan-out runs under the subscriber-set
//! lock, so delivery is not reentrant: a sink must not call back into
//! `send`, `add_listener` or `remove_listener` on the same source.

use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Receiver of items of type `T`.
///
/// The default `recv` accepts and drops, so a minimal sink only needs
/// the trait to be named. Implementations must be fast: they run inline
/// on the sending thread with the source's subscriber set held.
pub trait Sink<T>: Send + Sync {
    /// Handles one item. `false` signals a failed delivery; the source
    /// keeps delivering to the remaining sinks either way.
    fn recv(&self, _item: &T) -> bool {
        true
    }

    /// Diagnostic name.
    fn name(&self) -> &str {
        "sink"
    }
}

/// Identity of a registered sink: the data pointer of its `Arc`.
type SinkId = usize;

fn sink_id<S: ?Sized>(sink: &Arc<S>) -> SinkId {
    Arc::as_ptr(sink).cast::<()>() as usize
}

/// Publisher of items of type `T`.
///
/// `send` delivers to every registered sink while the source is online;
/// an offline source short-circuits to a successful no-op and keeps its
/// registrations.
pub struct Source<T> {
    name: Mutex<String>,
    online: AtomicBool,
    sinks: Mutex<Vec<(SinkId, Weak<dyn Sink<T>>)>>,
}

impl<T> Source<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Mutex::new(name.into()),
            online: AtomicBool::new(true),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Diagnostic name, settable for tracking many sources.
    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock() = name.into();
    }

    /// Registers `sink` as a listener. Registration is once-only per
    /// sink identity: re-adding is a no-op. Returns `true` if this call
    /// added it.
    pub fn add_listener<S>(&self, sink: &Arc<S>) -> bool
    where
        S: Sink<T> + 'static,
    {
        let id = sink_id(sink);
        let weak = Arc::downgrade(sink) as Weak<dyn Sink<T>>;
        let mut sinks = self.sinks.lock();
        sinks.retain(|(_, w)| w.strong_count() > 0);
        if sinks.iter().any(|(sid, _)| *sid == id) {
            return false;
        }
        sinks.push((id, weak));
        true
    }

    /// Unregisters `sink`. Returns `true` if it was registered.
    pub fn remove_listener<S>(&self, sink: &Arc<S>) -> bool
    where
        S: Sink<T> + 'static,
    {
        let id = sink_id(sink);
        let mut sinks = self.sinks.lock();
        let was_registered = sinks.iter().any(|(sid, _)| *sid == id);
        sinks.retain(|(sid, w)| *sid != id && w.strong_count() > 0);
        was_registered
    }

    /// Drops every registration, effectively idling the source.
    pub fn remove_all_listeners(&self) {
        self.sinks.lock().clear();
    }

    /// Number of live registered sinks.
    pub fn listener_count(&self) -> usize {
        self.sinks
            .lock()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .count()
    }

    /// Delivers `item` to every registered sink, in registration order,
    /// on this thread. Returns `true` if the source is offline or every
    /// delivery succeeded; every live sink receives the item regardless
    /// of earlier failures.
    ///
    /// Not reentrant: the subscriber set is held for the whole fan-out.
    pub fn send(&self, item: &T) -> bool {
        if !self.is_online() {
            return true;
        }

        let mut sinks = self.sinks.lock();
        let mut ok = true;
        let mut dead = false;
        for (_, weak) in sinks.iter() {
            match weak.upgrade() {
                Some(sink) => {
                    if !sink.recv(item) {
                        ok = false;
                    }
                }
                None => dead = true,
            }
        }
        if dead {
            sinks.retain(|(_, w)| w.strong_count() > 0);
        }
        ok
    }

    /// Stops or resumes the flow without touching registrations; an
    /// offline source's `send` is a successful no-op.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn take_online(&self) {
        self.set_online(true);
    }

    pub fn take_offline(&self) {
        self.set_online(false);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

impl<T> Default for Source<T> {
    fn default() -> Self {
        Self::new("source")
    }
}

/// A sink of `TIN` fused to a source of `TOUT` through a transform.
///
/// `recv` applies the transform and forwards its output; a `None`
/// transform result drops the input (and counts as a successful recv).
/// Chain pipelines by registering downstream sinks on
/// [`Adapter::source`].
pub struct Adapter<TIN, TOUT, F> {
    name: String,
    transform: F,
    out: Source<TOUT>,
    _in: PhantomData<fn(&TIN)>,
}

impl<TIN, TOUT, F> Adapter<TIN, TOUT, F>
where
    F: Fn(&TIN) -> Option<TOUT> + Send + Sync,
{
    pub fn new(name: impl Into<String>, transform: F) -> Self {
        let name = name.into();
        Self {
            out: Source::new(name.clone()),
            name,
            transform,
            _in: PhantomData,
        }
    }

    /// The outgoing side, for registering downstream listeners and for
    /// online/offline control.
    pub fn source(&self) -> &Source<TOUT> {
        &self.out
    }
}

impl<TIN, TOUT> Adapter<TIN, TOUT, fn(&TIN) -> Option<TOUT>> {
    /// The trivial adapter: accepts everything, emits nothing.
    pub fn drop_all(name: impl Into<String>) -> Self {
        Self::new(name, (|_| None) as fn(&TIN) -> Option<TOUT>)
    }
}

impl<TIN, TOUT, F> Sink<TIN> for Adapter<TIN, TOUT, F>
where
    TIN: Send + Sync,
    TOUT: Send + Sync,
    F: Fn(&TIN) -> Option<TOUT> + Send + Sync,
{
    fn recv(&self, item: &TIN) -> bool {
        match (self.transform)(item) {
            Some(out) => self.out.send(&out),
            None => true,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
