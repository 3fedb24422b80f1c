//! Datagram channel abstraction.
//!
//! The ARQ endpoints only need an unordered, unreliable datagram channel:
//! send a byte block to an address, and receive the next byte block together
//! with its origin.  [`DatagramChannel`] is that seam.  [`Socket`] is the
//! production implementation, a thin wrapper around `tokio::net::UdpSocket`;
//! [`crate::simulator`] provides in-memory and fault-injecting ones.
//!
//! Channels move raw bytes rather than decoded packets so that malformed
//! datagrams reach the protocol layer, which decides how to discard them.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};

/// Largest datagram the endpoints bother to read.
pub const MAX_DATAGRAM: usize = 1500;

/// Errors that can arise while setting up a socket.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("could not resolve {0}")]
    Resolve(String),
}

/// An unordered, unreliable datagram channel.
pub trait DatagramChannel {
    /// Address peers use to reach this channel.
    fn local_addr(&self) -> SocketAddr;

    /// Send `buf` as one datagram to `dest`.
    fn send_to(
        &self,
        buf: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Wait for the next datagram, copy it into `buf`, and return its length
    /// and origin.
    ///
    /// Must be cancel-safe: dropping the future before it resolves loses no
    /// datagram.  The endpoints rely on this to bound each wait with a timeout.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

/// A UDP socket speaking raw datagrams.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }
}

impl DatagramChannel for Socket {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(buf, dest).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

/// Resolve `host:port` to the first matching socket address.
pub async fn resolve(target: &str) -> Result<SocketAddr, SocketError> {
    lookup_host(target)
        .await?
        .next()
        .ok_or_else(|| SocketError::Resolve(target.to_string()))
}

/// Wildcard address of the same family as `peer`, for binding a sender.
pub fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_datagram_roundtrip() {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        a.send_to(b"hello", b.local_addr()).await.unwrap();

        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, a.local_addr);
    }

    #[tokio::test]
    async fn resolve_localhost_literal() {
        let addr = resolve("127.0.0.1:27016").await.unwrap();
        assert_eq!(addr, "127.0.0.1:27016".parse().unwrap());
    }

    #[tokio::test]
    async fn resolve_garbage_fails() {
        assert!(resolve("not an address").await.is_err());
    }

    #[test]
    fn unspecified_matches_family() {
        let v4: SocketAddr = "10.0.0.1:9".parse().unwrap();
        let v6: SocketAddr = "[::1]:9".parse().unwrap();
        assert!(unspecified_for(v4).is_ipv4());
        assert!(unspecified_for(v6).is_ipv6());
    }
}
