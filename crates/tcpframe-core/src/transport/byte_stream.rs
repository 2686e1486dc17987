use std::io;

use tracing::debug;

use crate::transport::{StreamTransport, TransportError};
use crate::Status;

/// Raw byte transfer over a [`StreamTransport`].
///
/// `send_bytes` keeps writing until the whole buffer is gone or the transport
/// refuses more; `receive_bytes` issues a single receive. Both report how many
/// bytes actually moved so callers can resume.
pub struct ByteStream<T> {
    io: T,
    last_error: Option<TransportError>,
}

impl<T> ByteStream<T> {
    pub fn new(io: T) -> Self {
        Self { io, last_error: None }
    }

    pub fn get_ref(&self) -> &T {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.io
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    // Detail behind the most recent Error/Disconnected outcome.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<TransportError> {
        self.last_error.take()
    }

    fn fail(&mut self, err: TransportError, status: Status, moved: usize) -> (Status, usize) {
        debug!(error = %err, %status, moved, "byte transfer failed");
        self.last_error = Some(err);
        (status, moved)
    }
}

impl<T: StreamTransport> ByteStream<T> {
    /// Send the whole of `data`, returning the status and the bytes sent.
    ///
    /// A would-block after some progress is reported as [`Status::Partial`];
    /// the caller resumes from `&data[sent..]`.
    pub fn send_bytes(&mut self, data: &[u8]) -> (Status, usize) {
        if data.is_empty() {
            return self.fail(TransportError::EmptyBuffer, Status::Error, 0);
        }

        let mut sent = 0;
        while sent < data.len() {
            match self.io.send_some(&data[sent..]) {
                Ok(0) => return self.fail(TransportError::WriteZero, Status::Error, sent),
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let status = match Status::from_io_error(&e) {
                        Status::NotReady if sent > 0 => Status::Partial,
                        other => other,
                    };
                    if matches!(status, Status::NotReady | Status::Partial) {
                        return (status, sent);
                    }
                    return self.fail(TransportError::Io(e), status, sent);
                }
            }
        }

        (Status::Done, sent)
    }

    /// Receive at most `buf.len()` bytes with a single transport call.
    ///
    /// Zero bytes from a healthy transport means the peer shut down.
    pub fn receive_bytes(&mut self, buf: &mut [u8]) -> (Status, usize) {
        if buf.is_empty() {
            return self.fail(TransportError::EmptyBuffer, Status::Error, 0);
        }

        loop {
            match self.io.recv_some(buf) {
                Ok(0) => return self.fail(TransportError::PeerClosed, Status::Disconnected, 0),
                Ok(n) => return (Status::Done, n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let status = Status::from_io_error(&e);
                    if status == Status::NotReady {
                        return (status, 0);
                    }
                    return self.fail(TransportError::Io(e), status, 0);
                }
            }
        }
    }
}
