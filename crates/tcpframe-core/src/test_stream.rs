use std::collections::VecDeque;
use std::io;

use crate::transport::StreamTransport;

// Scripted in-memory transport for exercising fragmentation and partial writes.
// An exhausted read script behaves like a non-blocking socket with no data;
// an exhausted write script accepts everything.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStream {
    reads: VecDeque<ReadStep>,
    writes: VecDeque<WriteStep>,
    pub written: Vec<u8>,
    pub recv_calls: usize,
    pub largest_recv_request: usize,
}

#[derive(Debug)]
pub(crate) enum ReadStep {
    Data(Vec<u8>),
    WouldBlock,
    Eof,
    Fail(io::ErrorKind),
}

#[derive(Debug)]
pub(crate) enum WriteStep {
    Accept(usize),
    WouldBlock,
    Fail(io::ErrorKind),
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, bytes: &[u8]) -> Self {
        self.push_read(bytes);
        self
    }

    pub fn would_block(mut self) -> Self {
        self.reads.push_back(ReadStep::WouldBlock);
        self
    }

    pub fn eof(mut self) -> Self {
        self.reads.push_back(ReadStep::Eof);
        self
    }

    pub fn read_fail(mut self, kind: io::ErrorKind) -> Self {
        self.reads.push_back(ReadStep::Fail(kind));
        self
    }

    pub fn accept(mut self, n: usize) -> Self {
        self.writes.push_back(WriteStep::Accept(n));
        self
    }

    pub fn block_write(mut self) -> Self {
        self.writes.push_back(WriteStep::WouldBlock);
        self
    }

    pub fn write_fail(mut self, kind: io::ErrorKind) -> Self {
        self.writes.push_back(WriteStep::Fail(kind));
        self
    }

    pub fn push_read(&mut self, bytes: &[u8]) {
        self.reads.push_back(ReadStep::Data(bytes.to_vec()));
    }

    pub fn push_eof(&mut self) {
        self.reads.push_back(ReadStep::Eof);
    }
}

impl StreamTransport for ScriptedStream {
    fn send_some(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writes.pop_front() {
            None => {
                self.written.extend_from_slice(buf);
                Ok(buf.len())
            }
            Some(WriteStep::Accept(n)) => {
                let n = n.min(buf.len());
                self.written.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Some(WriteStep::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(WriteStep::Fail(kind)) => Err(kind.into()),
        }
    }

    fn recv_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv_calls += 1;
        self.largest_recv_request = self.largest_recv_request.max(buf.len());

        match self.reads.pop_front() {
            None | Some(ReadStep::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(ReadStep::Eof) => Ok(0),
            Some(ReadStep::Fail(kind)) => Err(kind.into()),
            Some(ReadStep::Data(chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.reads.push_front(ReadStep::Data(chunk[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }
}
