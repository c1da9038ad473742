//! Tokio I/O adapters for the conflux pub-sub core.
//!
//! [`UdpReceiver`] is a [`conflux::Source`] of [`Datagram`]s: a tokio
//! task reads from the socket into pooled buffers and fans each datagram
//! out to the registered sinks on the reader task. [`UdpTransmitter`] is
//! a [`conflux::Sink`] of datagrams: `recv` enqueues into a lock-free
//! ring that a tokio task drains onto the socket.
//!
//! Buffers are recycled through a [`conflux::Pool`], so a steady-state
//! receive loop allocates nothing.
//!
//! # Example
//!
//! ```no_run
//! use conflux_io::{Datagram, UdpReceiver};
//! use conflux::Sink;
//! use std::sync::Arc;
//!
//! struct Printer;
//! impl Sink<Datagram> for Printer {
//!     fn recv(&self, dgram: &Datagram) -> bool {
//!         println!("{} bytes at {}us", dgram.len(), dgram.received_at());
//!         true
//!     }
//! }
//!
//! # async fn run() -> Result<(), conflux_io::TransportError> {
//! let receiver = UdpReceiver::bind("0.0.0.0:9999".parse().unwrap()).await?;
//! receiver.source().add_listener(&Arc::new(Printer));
//! receiver.start();
//! # Ok(())
//! # }
//! ```

mod channel;
mod datagram;
mod error;
mod receiver;
mod transmitter;

pub mod timer;

pub use channel::MulticastChannel;
pub use datagram::Datagram;
pub use error::TransportError;
pub use receiver::UdpReceiver;
pub use transmitter::UdpTransmitter;
