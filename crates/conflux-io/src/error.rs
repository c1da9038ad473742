//! Error types for the I/O adapters.

use thiserror::Error;

/// Errors from binding, joining and moving datagrams.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding the socket failed.
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    /// Joining a multicast group failed.
    #[error("multicast join failed: {0}")]
    Join(std::io::Error),

    /// A send or receive on the socket failed.
    #[error("socket i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A channel spec could not be parsed.
    #[error("bad channel spec: {0}")]
    BadChannel(String),
}

impl TransportError {
    /// `true` for errors worth retrying on the same socket.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
        ))
    }
}
