pub mod traits;
pub mod byte_stream;


pub use traits::*;
pub use byte_stream::*;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("empty buffer: nothing to send or receive into")]
    EmptyBuffer,

    #[error("transport accepted zero bytes")]
    WriteZero,

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
