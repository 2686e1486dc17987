use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

use tracing::{debug, warn};

use tcpframe_core::{FrameIo, FrameLimits, FramedStream, Message, Status};

use crate::error::NetError;
use crate::sys;

// How a connect attempt ended before the connection decides what to keep.
enum Attempt {
    Connected,
    // Non-blocking connect still in progress; the caller finishes it.
    InProgress,
    Failed(Status, NetError),
}

/// A TCP stream socket carrying length-prefixed messages.
///
/// Owns the socket handle, the blocking-mode flag, and (through its framed
/// stream) the partial-receive state. Every operation takes `&mut self`: one
/// owner drives a connection at a time.
pub struct TcpConnection {
    stream: Option<FramedStream<TcpStream>>,
    blocking: bool,
    limits: FrameLimits,
    last_error: Option<NetError>,
}

impl TcpConnection {
    pub fn new() -> Self {
        Self::with_limits(FrameLimits::DEFAULT)
    }

    pub fn with_limits(limits: FrameLimits) -> Self {
        Self {
            stream: None,
            blocking: true,
            limits,
            last_error: None,
        }
    }

    // Wrap an already connected stream (e.g. from accept).
    pub(crate) fn from_stream(stream: TcpStream, limits: FrameLimits) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        Ok(Self {
            stream: Some(FramedStream::new(stream, limits)),
            blocking: true,
            limits,
            last_error: None,
        })
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Switch between blocking and non-blocking mode.
    ///
    /// The setting sticks across reconnects.
    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.get_ref().set_nonblocking(!blocking) {
                warn!(error = %e, blocking, "failed to change socket blocking mode");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.peer().is_some()
    }

    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    // Detail behind the latest failed operation.
    pub fn last_error(&self) -> Option<&NetError> {
        self.last_error.as_ref()
    }

    // Bytes of the incoming frame received so far, prefix included.
    pub fn pending_len(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.pending_len())
    }

    /// Connect to `address:port`, tearing down any existing connection first.
    ///
    /// A zero `timeout` issues a plain connect in the current blocking mode.
    /// Otherwise the attempt runs non-blocking and waits at most `timeout`
    /// for completion; expiry returns [`Status::NotReady`] with
    /// [`NetError::TimedOut`] recorded. The blocking mode is the same after
    /// the call as before it.
    pub fn connect(&mut self, address: Ipv4Addr, port: u16, timeout: Duration) -> Status {
        self.disconnect();
        self.last_error = None;

        let peer = SocketAddrV4::new(address, port);
        let socket = match sys::new_socket() {
            Ok(socket) => socket,
            Err(e) => {
                self.last_error = Some(NetError::Io(e));
                return Status::Error;
            }
        };

        debug!(%peer, ?timeout, blocking = self.blocking, "connecting");

        let attempt = if timeout.is_zero() {
            self.connect_direct(&socket, peer)
        } else {
            self.connect_timed(&socket, peer, timeout)
        };

        match attempt {
            Attempt::Connected => {
                self.stream = Some(FramedStream::new(socket, self.limits));
                debug!(%peer, local_port = self.local_port(), "connected");
                Status::Done
            }
            Attempt::InProgress => {
                self.stream = Some(FramedStream::new(socket, self.limits));
                debug!(%peer, "connect in progress");
                Status::NotReady
            }
            Attempt::Failed(status, err) => {
                debug!(%peer, %status, error = %err, "connect failed");
                self.last_error = Some(err);
                status
            }
        }
    }

    fn connect_direct(&self, socket: &TcpStream, peer: SocketAddrV4) -> Attempt {
        if let Err(e) = socket.set_nonblocking(!self.blocking) {
            return Attempt::Failed(Status::Error, NetError::Io(e));
        }

        match sys::connect(socket, *peer.ip(), peer.port()) {
            Ok(()) => Attempt::Connected,
            Err(e) => match sys::status_of(&e) {
                // Interrupted blocking connect: the handshake continues in the kernel.
                Status::NotReady if self.blocking => Self::await_connect(socket, peer, None),
                Status::NotReady => Attempt::InProgress,
                status => Attempt::Failed(status, NetError::from_connect(e, peer, Duration::ZERO)),
            },
        }
    }

    fn connect_timed(&self, socket: &TcpStream, peer: SocketAddrV4, timeout: Duration) -> Attempt {
        if let Err(e) = socket.set_nonblocking(true) {
            return Attempt::Failed(Status::Error, NetError::Io(e));
        }

        let attempt = match sys::connect(socket, *peer.ip(), peer.port()) {
            Ok(()) => Attempt::Connected,
            Err(e) => match sys::status_of(&e) {
                // Already non-blocking: the caller polls for completion itself.
                Status::NotReady if !self.blocking => Attempt::InProgress,
                Status::NotReady => Self::await_connect(socket, peer, Some(timeout)),
                status => Attempt::Failed(status, NetError::from_connect(e, peer, timeout)),
            },
        };

        if self.blocking {
            if let Err(e) = socket.set_nonblocking(false) {
                warn!(error = %e, "failed to restore blocking mode");
                if matches!(attempt, Attempt::Connected) {
                    return Attempt::Failed(Status::Error, NetError::Io(e));
                }
            }
        }

        attempt
    }

    // Wait for the in-flight connect, then probe the peer: write-readiness
    // alone is reported for both success and refusal.
    fn await_connect(socket: &TcpStream, peer: SocketAddrV4, timeout: Option<Duration>) -> Attempt {
        let limit = timeout.unwrap_or(Duration::ZERO);
        match sys::wait_writable(socket, timeout) {
            Ok(true) => {
                if socket.peer_addr().is_ok() {
                    return Attempt::Connected;
                }

                let err = match socket.take_error() {
                    Ok(Some(e)) => e,
                    Ok(None) => io::ErrorKind::NotConnected.into(),
                    Err(e) => e,
                };
                let status = match sys::status_of(&err) {
                    Status::Done | Status::Partial | Status::NotReady => Status::Error,
                    other => other,
                };
                Attempt::Failed(status, NetError::from_connect(err, peer, limit))
            }
            Ok(false) => Attempt::Failed(Status::NotReady, NetError::TimedOut { peer, timeout: limit }),
            Err(e) => Attempt::Failed(Status::Error, NetError::Io(e)),
        }
    }

    /// Close the socket and drop all in-flight state. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(
                local_port = local_port_of(stream.get_ref()),
                pending = stream.pending_len(),
                "disconnecting"
            );
        }
    }

    pub fn local_port(&self) -> u16 {
        self.stream.as_ref().map_or(0, |s| local_port_of(s.get_ref()))
    }

    pub fn remote_address(&self) -> Option<Ipv4Addr> {
        self.peer().map(|peer| *peer.ip())
    }

    pub fn remote_port(&self) -> u16 {
        self.peer().map_or(0, |peer| peer.port())
    }

    fn peer(&self) -> Option<SocketAddrV4> {
        match self.stream.as_ref()?.get_ref().peer_addr().ok()? {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(v6) => v6.ip().to_ipv4_mapped().map(|ip| SocketAddrV4::new(ip, v6.port())),
        }
    }

    /// Send raw bytes; see [`FramedStream::send_bytes`]. Resume a
    /// [`Status::Partial`] with `&data[sent..]`.
    pub fn send_bytes(&mut self, data: &[u8]) -> (Status, usize) {
        self.with_stream((Status::Error, 0), |s| s.send_bytes(data))
    }

    /// Send raw bytes without reporting how many went out.
    ///
    /// Only safe in blocking mode: a partial send cannot be resumed.
    pub fn send_all(&mut self, data: &[u8]) -> Status {
        if !self.blocking {
            warn!("send_all on a non-blocking connection; partial sends cannot be resumed");
        }
        self.send_bytes(data).0
    }

    pub fn receive_bytes(&mut self, buf: &mut [u8]) -> (Status, usize) {
        self.with_stream((Status::Error, 0), |s| s.receive_bytes(buf))
    }

    fn with_stream<R>(
        &mut self,
        not_connected: R,
        op: impl FnOnce(&mut FramedStream<TcpStream>) -> R,
    ) -> R {
        self.last_error = None;
        let Some(stream) = self.stream.as_mut() else {
            self.last_error = Some(NetError::NotConnected);
            return not_connected;
        };

        let out = op(stream);
        if let Some(err) = stream.take_last_error() {
            self.last_error = Some(err.into());
        }
        out
    }
}

impl FrameIo for TcpConnection {
    fn send_message(&mut self, message: &mut Message) -> Status {
        self.with_stream(Status::Error, |s| s.send_message(message))
    }

    fn receive_message(&mut self, message: &mut Message) -> Status {
        self.with_stream(Status::Error, |s| s.receive_message(message))
    }
}

impl Default for TcpConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn local_port_of(socket: &TcpStream) -> u16 {
    socket.local_addr().map_or(0, |addr| addr.port())
}
