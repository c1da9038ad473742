//! UDP receiver: a datagram source fed by a tokio reader task.

use crate::{Datagram, MulticastChannel, TransportError};
use conflux::fifo::QueueKind;
use conflux::pool::Pool;
use conflux::pubsub::Source;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Pool cap exponent: 2^4 buffers is plenty for one reader task.
const POOL_BITS: u8 = 4;

struct Inner {
    source: Source<Datagram>,
    pool: Pool<Datagram>,
    socket: UdpSocket,
    running: AtomicBool,
}

/// A [`Source`] of [`Datagram`]s read from a UDP socket.
///
/// [`UdpReceiver::start`] spawns a tokio task that reads into pooled
/// buffers, stamps each datagram, and fans it out synchronously to the
/// registered sinks (on the reader task, so sinks must be fast). The
/// buffer is recycled after the fan-out, so sinks that keep payloads
/// clone them.
///
/// Taking the source offline pauses delivery without dropping the
/// socket; [`UdpReceiver::stop`] ends the reader task.
pub struct UdpReceiver {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UdpReceiver {
    /// Binds a unicast socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await.map_err(TransportError::Bind)?;
        Ok(Self::from_socket(socket))
    }

    /// Binds on the channel's port and joins the group when the channel
    /// address is multicast.
    pub async fn bind_channel(channel: &MulticastChannel) -> Result<Self, TransportError> {
        let bind_ip = if channel.is_multicast() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            channel.addr()
        };
        let socket = UdpSocket::bind(SocketAddr::new(bind_ip, channel.port()))
            .await
            .map_err(TransportError::Bind)?;

        if channel.is_multicast() {
            match channel.addr() {
                IpAddr::V4(group) => socket
                    .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                    .map_err(TransportError::Join)?,
                IpAddr::V6(group) => socket
                    .join_multicast_v6(&group, 0)
                    .map_err(TransportError::Join)?,
            }
            debug!("joined multicast group {channel}");
        }
        Ok(Self::from_socket(socket))
    }

    fn from_socket(socket: UdpSocket) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: Source::new("udp-receiver"),
                // Take and recycle both happen on the reader task.
                pool: Pool::new(POOL_BITS, QueueKind::Spsc),
                socket,
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    /// The bound address (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.socket.local_addr()?)
    }

    /// The outgoing side: register sinks and toggle online state here.
    pub fn source(&self) -> &Source<Datagram> {
        &self.inner.source
    }

    /// Spawns the reader task. Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *self.task.lock() = Some(tokio::spawn(run_loop(inner)));
    }

    /// Stops the reader task.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// `true` while the reader task is live.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(inner: Arc<Inner>) {
    debug!(
        "udp receiver listening on {:?}",
        inner.socket.local_addr().ok()
    );
    while inner.running.load(Ordering::Acquire) {
        let mut dgram = inner.pool.take();
        dgram.reset();

        match inner.socket.recv_from(dgram.bytes_mut()).await {
            Ok((len, from)) => {
                dgram.set_len(len);
                dgram.stamp();
                trace!("{len} bytes from {from}");
                if !inner.source.send(&dgram) {
                    debug!("a sink refused a datagram from {from}");
                }
            }
            Err(e) => {
                if inner.running.load(Ordering::Acquire) {
                    warn!("udp recv failed: {e}");
                }
            }
        }
        inner.pool.recycle(dgram);
    }
    debug!("udp receiver stopped");
}
