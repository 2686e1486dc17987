use crate::framing::Message;
use crate::transport::TransportError;
use crate::Status;

/*
    Message-level interface over a byte stream.
      - Both calls are resumable: a non-Done status keeps all progress
        so the caller can invoke the same call again later.
      - send_message must be repeated with the same Message after Partial.
*/
pub trait FrameIo {
    fn send_message(&mut self, message: &mut Message) -> Status;
    fn receive_message(&mut self, message: &mut Message) -> Status;
}

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("frame too large: len={len}, max={max}")]
    FrameTooLarge { len: u64, max: u32 },

    #[error("send cursor {pos} is past the end of a {len}-byte frame")]
    CursorOutOfRange { pos: usize, len: usize },
}
