/*
    tcpframe-core
        byte-stream transport primitives and resumable
        length-prefixed message framing.
 */

pub mod status;

pub mod transport;
pub mod framing;

pub use status::Status;
pub use transport::{ByteStream, StreamTransport, TransportError};
pub use framing::{FrameIo, FrameLimits, FramedStream, FramingError, Message};

#[cfg(test)]
mod test_stream;
