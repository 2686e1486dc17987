use std::io::{self, Read, Write};

/*
    Lowest-level view of a stream socket.
      - Each method is exactly one OS send/recv call, no looping.
      - Errors are reported raw; ByteStream classifies them.
*/
pub trait StreamTransport {
    fn send_some(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn recv_some(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl StreamTransport for std::net::TcpStream {
    fn send_some(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn recv_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

#[cfg(unix)]
impl StreamTransport for std::os::unix::net::UnixStream {
    fn send_some(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn recv_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

impl<T: StreamTransport + ?Sized> StreamTransport for &mut T {
    fn send_some(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).send_some(buf)
    }

    fn recv_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv_some(buf)
    }
}
