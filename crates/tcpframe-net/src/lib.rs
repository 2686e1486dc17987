/*
    tcpframe-net
        TCP connection management for tcpframe: deadline-bounded connect,
        endpoint introspection and framed send/receive on one socket.
        Unix only (libc sockets + poll).
 */

mod conn;
mod error;
mod listener;
mod sys;

pub use conn::TcpConnection;
pub use error::NetError;
pub use listener::TcpListener;

pub use tcpframe_core::{FrameIo, FrameLimits, Message, Status};
