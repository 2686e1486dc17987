use std::{fmt, io};

/// Outcome of a single transport or framing operation.
///
/// Every send/receive returns one of these; none of them is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation fully completed.
    Done,
    /// Some bytes moved but not all of them. Retry with the remainder.
    Partial,
    /// Nothing could move without blocking.
    NotReady,
    /// The peer closed the connection.
    Disconnected,
    /// Unrecoverable failure.
    Error,
}

impl Status {
    pub fn is_done(self) -> bool {
        self == Status::Done
    }

    // Map an OS-level I/O error onto the closed status set.
    pub fn from_io_error(err: &io::Error) -> Status {
        use io::ErrorKind::*;

        match err.kind() {
            WouldBlock => Status::NotReady,
            ConnectionAborted | ConnectionReset | TimedOut | NotConnected | BrokenPipe
            | UnexpectedEof => Status::Disconnected,
            _ => Status::Error,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Done => "done",
            Status::Partial => "partial",
            Status::NotReady => "not ready",
            Status::Disconnected => "disconnected",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}
