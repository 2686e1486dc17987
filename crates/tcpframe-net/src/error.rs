use std::net::SocketAddrV4;
use std::time::Duration;

use thiserror::Error;

use tcpframe_core::FramingError;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("connection refused by {peer}")]
    Refused { peer: SocketAddrV4 },

    #[error("connect to {peer} timed out after {timeout:?}")]
    TimedOut { peer: SocketAddrV4, timeout: Duration },

    #[error("socket is not connected")]
    NotConnected,
}

impl NetError {
    // Detail for a failed connect attempt.
    pub(crate) fn from_connect(err: std::io::Error, peer: SocketAddrV4, timeout: Duration) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => NetError::Refused { peer },
            std::io::ErrorKind::TimedOut => NetError::TimedOut { peer, timeout },
            _ => NetError::Io(err),
        }
    }
}
