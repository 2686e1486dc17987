use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::framing::pending::PendingFrame;
use crate::framing::{FrameIo, FrameLimits, FramingError, Message, LENGTH_PREFIX_LEN};
use crate::transport::{ByteStream, StreamTransport};
use crate::Status;

// Upper bound on a single payload receive call.
const RECV_CHUNK_LEN: usize = 1024;

// Never pre-allocate more than this for a declared payload length.
const MAX_PREALLOC: usize = 64 * 1024;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

fn next_session() -> u64 {
    NEXT_SESSION.fetch_add(1, Ordering::Relaxed)
}

/// Length-prefixed framing over a byte stream, resumable in non-blocking mode.
///
/// Frame format:
///   [u32 big-endian length][payload bytes...]
///
/// Receive progress is kept between calls, so a caller polling a
/// non-blocking socket reassembles each message without losing or re-reading
/// bytes. Send progress lives in the [`Message`] itself.
pub struct FramedStream<T> {
    io: ByteStream<T>,
    limits: FrameLimits,
    session: u64,
    pending: PendingFrame,
    block: Vec<u8>,
    last_error: Option<FramingError>,
}

impl<T> FramedStream<T> {
    pub fn new(io: T, limits: FrameLimits) -> Self {
        Self {
            io: ByteStream::new(io),
            limits,
            session: next_session(),
            pending: PendingFrame::default(),
            block: Vec::new(),
            last_error: None,
        }
    }

    pub fn get_ref(&self) -> &T {
        self.io.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.io.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.io.into_inner()
    }

    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    // Identifies this stream's lifetime; changes on every reset.
    pub fn session(&self) -> u64 {
        self.session
    }

    // Bytes of the incoming frame received so far, prefix included.
    pub fn pending_len(&self) -> usize {
        self.pending.received()
    }

    pub fn last_error(&self) -> Option<&FramingError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<FramingError> {
        self.last_error.take()
    }

    /// Drop all in-flight state: the partially received frame and, by moving
    /// to a new session, every outstanding partial-send cursor.
    pub fn reset(&mut self) {
        self.pending.reset();
        self.block.clear();
        self.session = next_session();
        self.last_error = None;
    }

    fn fail(&mut self, err: FramingError) -> Status {
        debug!(error = %err, "framing failed");
        self.last_error = Some(err);
        Status::Error
    }

    fn absorb_transport_error(&mut self) {
        if let Some(err) = self.io.take_last_error() {
            self.last_error = Some(err.into());
        }
    }
}

impl<T: StreamTransport> FramedStream<T> {
    pub fn send_bytes(&mut self, data: &[u8]) -> (Status, usize) {
        let res = self.io.send_bytes(data);
        self.absorb_transport_error();
        res
    }

    pub fn receive_bytes(&mut self, buf: &mut [u8]) -> (Status, usize) {
        let res = self.io.receive_bytes(buf);
        self.absorb_transport_error();
        res
    }

    fn receive_prefix(&mut self) -> Status {
        while !self.pending.prefix_complete() {
            let start = self.pending.prefix_received;
            let (status, received) = self.io.receive_bytes(&mut self.pending.prefix[start..]);
            self.pending.prefix_received += received;

            if status != Status::Done {
                self.absorb_transport_error();
                return status;
            }
        }
        Status::Done
    }

    fn expected_len(&mut self) -> Result<usize, FramingError> {
        if let Some(len) = self.pending.expected {
            return Ok(len as usize);
        }

        let len = u32::from_be_bytes(self.pending.prefix);
        if len > self.limits.max_frame_len {
            warn!(len, max = self.limits.max_frame_len, "peer declared an oversized frame");
            return Err(FramingError::FrameTooLarge {
                len: len as u64,
                max: self.limits.max_frame_len,
            });
        }

        self.pending.expected = Some(len);
        self.pending.payload.reserve((len as usize).min(MAX_PREALLOC));
        Ok(len as usize)
    }
}

impl<T: StreamTransport> FrameIo for FramedStream<T> {
    fn send_message(&mut self, message: &mut Message) -> Status {
        if message.send_session != Some(self.session) {
            message.reset_cursor();
        }

        let len = match self.limits.validate_len(message.payload.len()) {
            Ok(len) => len,
            Err(e) => return self.fail(e),
        };

        // Prefix and payload go out as one block so a short write can never
        // leave the length alone on the wire.
        self.block.clear();
        self.block.reserve(LENGTH_PREFIX_LEN + message.payload.len());
        self.block.extend_from_slice(&len.to_be_bytes());
        self.block.extend_from_slice(&message.payload);

        if message.send_pos >= self.block.len() {
            let err = FramingError::CursorOutOfRange {
                pos: message.send_pos,
                len: self.block.len(),
            };
            message.reset_cursor();
            return self.fail(err);
        }

        let (status, sent) = self.io.send_bytes(&self.block[message.send_pos..]);
        self.absorb_transport_error();

        match status {
            Status::Partial => {
                message.send_pos += sent;
                message.send_session = Some(self.session);
            }
            Status::Done => message.reset_cursor(),
            _ => {}
        }
        status
    }

    fn receive_message(&mut self, message: &mut Message) -> Status {
        message.clear();

        let status = self.receive_prefix();
        if status != Status::Done {
            return status;
        }

        let expected = match self.expected_len() {
            Ok(len) => len,
            Err(e) => return self.fail(e),
        };

        let mut chunk = [0u8; RECV_CHUNK_LEN];
        while self.pending.payload.len() < expected {
            let wanted = (expected - self.pending.payload.len()).min(RECV_CHUNK_LEN);
            let (status, received) = self.io.receive_bytes(&mut chunk[..wanted]);
            if status != Status::Done {
                self.absorb_transport_error();
                return status;
            }
            self.pending.payload.extend_from_slice(&chunk[..received]);
        }

        message.payload = mem::take(&mut self.pending.payload);
        self.pending.reset();
        Status::Done
    }
}
