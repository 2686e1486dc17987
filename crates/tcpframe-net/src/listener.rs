use std::net::{Ipv4Addr, SocketAddrV4};

use tracing::debug;

use tcpframe_core::FrameLimits;

use crate::{NetError, TcpConnection};

// Passive side: accepted connections start blocking with fresh framing state.
pub struct TcpListener {
    inner: std::net::TcpListener,
    limits: FrameLimits,
}

impl TcpListener {
    pub fn bind(address: Ipv4Addr, port: u16) -> Result<Self, NetError> {
        let inner = std::net::TcpListener::bind(SocketAddrV4::new(address, port))?;
        debug!(%address, port = local_port_of(&inner), "listening");

        Ok(Self {
            inner,
            limits: FrameLimits::DEFAULT,
        })
    }

    // Limits applied to every accepted connection.
    pub fn with_limits(mut self, limits: FrameLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn local_port(&self) -> u16 {
        local_port_of(&self.inner)
    }

    pub fn accept(&self) -> Result<TcpConnection, NetError> {
        let (stream, peer) = self.inner.accept()?;
        debug!(%peer, "accepted connection");

        Ok(TcpConnection::from_stream(stream, self.limits)?)
    }
}

fn local_port_of(listener: &std::net::TcpListener) -> u16 {
    listener.local_addr().map_or(0, |addr| addr.port())
}
