//! In-memory channels and fault injection for deterministic testing.
//!
//! Real networks drop and duplicate datagrams.  To exercise the reliability
//! mechanisms without depending on actual network conditions, this module
//! provides:
//!
//! - [`memory_pair`], two connected [`MemoryChannel`]s that behave like a
//!   perfect UDP link between two fixed addresses.
//! - [`Simulator`], which wraps any [`DatagramChannel`] and intercepts sends,
//!   applying a configurable fault model:
//!
//! | Fault            | Description                                      |
//! |------------------|--------------------------------------------------|
//! | Packet loss      | Drop a datagram with probability `loss_rate`.    |
//! | Duplication      | Deliver a datagram twice.                        |
//!
//! Fault decisions come from [`LossPolicy`] objects, seeded from
//! [`SimulatorConfig::seed`] so failures are reproducible.

use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::config::ConfigError;
use crate::loss::{policy_for, LossPolicy};
use crate::socket::DatagramChannel;

type Datagram = (Vec<u8>, SocketAddr);

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

/// One end of an in-process datagram link.
#[derive(Debug)]
pub struct MemoryChannel {
    addr: SocketAddr,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

/// Two connected channels bound to `a` and `b`.
///
/// Datagrams sent to any address other than the opposite end vanish, as they
/// would on a real network with nobody listening.
pub fn memory_pair(a: SocketAddr, b: SocketAddr) -> (MemoryChannel, MemoryChannel) {
    let (to_b, from_a) = mpsc::unbounded_channel();
    let (to_a, from_b) = mpsc::unbounded_channel();
    let end_a = MemoryChannel {
        addr: a,
        peer: b,
        tx: to_b,
        rx: tokio::sync::Mutex::new(from_b),
    };
    let end_b = MemoryChannel {
        addr: b,
        peer: a,
        tx: to_a,
        rx: tokio::sync::Mutex::new(from_a),
    };
    (end_a, end_b)
}

impl DatagramChannel for MemoryChannel {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<()> {
        if dest == self.peer {
            // A closed peer behaves like an unbound port: the datagram is lost.
            let _ = self.tx.send((buf.to_vec(), self.addr));
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut rx = self.rx.lock().await;
        let (bytes, from) = rx.recv().await.ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionAborted, "memory link closed")
        })?;
        // Oversized datagrams are truncated, as with a real UDP socket.
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok((n, from))
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a delivered datagram is sent twice.
    pub duplicate_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default — simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

/// Counters describing what the simulator did to outbound traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Datagrams handed to the simulator.
    pub offered: u64,
    pub dropped: u64,
    pub duplicated: u64,
}

/// A fault-injecting wrapper around a datagram channel.
///
/// Only outbound datagrams are subject to faults; receives pass straight
/// through to the inner channel.
pub struct Simulator<C> {
    inner: C,
    loss: Mutex<Box<dyn LossPolicy + Send>>,
    duplicate: Mutex<Box<dyn LossPolicy + Send>>,
    stats: Mutex<LinkStats>,
}

impl<C: DatagramChannel> Simulator<C> {
    /// Wrap `inner` with Bernoulli faults drawn from `config`.
    pub fn new(inner: C, config: SimulatorConfig) -> Result<Self, ConfigError> {
        let loss = policy_for(config.loss_rate, Some(config.seed))?;
        let duplicate = policy_for(config.duplicate_rate, Some(config.seed.wrapping_add(1)))?;
        Ok(Self::with_policies(inner, loss, duplicate))
    }

    /// Wrap `inner` with caller-supplied loss and duplication policies.
    pub fn with_policies(
        inner: C,
        loss: Box<dyn LossPolicy + Send>,
        duplicate: Box<dyn LossPolicy + Send>,
    ) -> Self {
        Self {
            inner,
            loss: Mutex::new(loss),
            duplicate: Mutex::new(duplicate),
            stats: Mutex::new(LinkStats::default()),
        }
    }

    pub fn stats(&self) -> LinkStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide the fate of one outbound datagram: how many copies to send.
    fn copies(&self) -> usize {
        let dropped = self
            .loss
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .should_drop();
        let duplicated = !dropped
            && self
                .duplicate
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .should_drop();

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.offered += 1;
        if dropped {
            stats.dropped += 1;
            log::debug!("[sim] datagram lost in channel");
            0
        } else if duplicated {
            stats.duplicated += 1;
            log::debug!("[sim] datagram duplicated in channel");
            2
        } else {
            1
        }
    }
}

impl<C: DatagramChannel + Sync> DatagramChannel for Simulator<C> {
    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<()> {
        for _ in 0..self.copies() {
            self.inner.send_to(buf, dest).await?;
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}
