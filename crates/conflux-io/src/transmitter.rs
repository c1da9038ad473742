//! UDP transmitter: a datagram sink drained onto a socket by a tokio
//! task.

use crate::{Datagram, TransportError};
use conflux::mpsc;
use conflux::pubsub::Sink;
use log::{debug, warn};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Safety-net poll interval for the drain loop; the notify is the
/// primary wake-up.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Inner {
    ring: mpsc::Ring<Datagram>,
    notify: Notify,
    socket: UdpSocket,
    dest: SocketAddr,
    running: AtomicBool,
}

/// A [`Sink`] of [`Datagram`]s that writes them to a UDP destination.
///
/// `recv` enqueues a copy of the datagram into a lock-free MPSC ring and
/// returns; any number of sending threads may share the sink. The
/// drain task pops the ring and does the socket writes. A full ring
/// fails the `recv`, which surfaces as a `false` send through the
/// pub/sub aggregation: backpressure, not blocking.
pub struct UdpTransmitter {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransmitter {
    /// Binds a local socket and aims the transmitter at `dest`. The
    /// ring holds `2^queue_bits` pending datagrams.
    pub async fn connect(
        bind: SocketAddr,
        dest: SocketAddr,
        queue_bits: u8,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind).await.map_err(TransportError::Bind)?;
        Ok(Self {
            inner: Arc::new(Inner {
                ring: mpsc::Ring::new(queue_bits),
                notify: Notify::new(),
                socket,
                dest,
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        })
    }

    /// Datagrams queued and not yet written (advisory).
    pub fn backlog(&self) -> usize {
        self.inner.ring.len()
    }

    /// Spawns the drain task. Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *self.task.lock() = Some(tokio::spawn(drain_loop(inner)));
    }

    /// Stops the drain task; queued datagrams are dropped with the ring.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        self.inner.notify.notify_one();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for UdpTransmitter {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Sink<Datagram> for UdpTransmitter {
    fn recv(&self, dgram: &Datagram) -> bool {
        if self.inner.ring.push(dgram.clone()).is_err() {
            return false;
        }
        self.inner.notify.notify_one();
        true
    }

    fn name(&self) -> &str {
        "udp-transmitter"
    }
}

async fn drain_loop(inner: Arc<Inner>) {
    debug!("udp transmitter draining to {}", inner.dest);
    while inner.running.load(Ordering::Acquire) {
        while let Some(dgram) = inner.ring.pop() {
            if let Err(e) = inner.socket.send_to(dgram.bytes(), inner.dest).await {
                warn!("udp send to {} failed: {e}", inner.dest);
            }
        }
        tokio::select! {
            () = inner.notify.notified() => {}
            () = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
    debug!("udp transmitter stopped");
}
