//! Send side: the sliding-window transfer loop.
//!
//! [`Sender`] owns a [`Window`] and a [`DatagramChannel`] and drives one
//! transfer of `total_packets` DATA packets to a fixed peer.  Each call to
//! [`Sender::step`] runs the four phases in order:
//!
//! 1. **Fill** — transmit every sequence the window currently allows.
//! 2. **Receive** — wait for at most one datagram.  The wait ends at the
//!    earliest retransmit deadline or after `poll_interval`, whichever comes
//!    first, so the loop never sleeps past a timeout and never spins.
//! 3. **Advance** — slide `base` over contiguously acknowledged sequences.
//! 4. **Retransmit** — resend every in-window sequence whose last
//!    transmission is at least `timeout` old.
//!
//! [`Sender::run`] repeats `step` until every sequence is resolved or the
//! stop signal fires.  Without `max_retries` an unacknowledged sequence is
//! retried forever, so a peer that never acknowledges keeps the sender
//! running until it is stopped.

use std::fmt;
use std::net::SocketAddr;
use std::ops::Range;

use tokio::sync::watch;
use tokio::time::{timeout, Duration, Instant};

use crate::config::{ConfigError, SenderConfig};
use crate::packet::{Packet, PacketType};
use crate::socket::{DatagramChannel, MAX_DATAGRAM};
use crate::window::{AckOutcome, Window};

// ---------------------------------------------------------------------------
// Statistics and report
// ---------------------------------------------------------------------------

/// Running totals for one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// DATA transmissions the channel accepted, first sends and
    /// retransmissions alike.
    pub sends: u64,
    pub retransmissions: u64,
    /// ACKs that resolved an in-flight sequence.
    pub acks: u64,
    pub duplicate_acks: u64,
    /// Datagrams that were not a usable ACK.
    pub ignored: u64,
    /// DATA transmissions the channel refused.
    pub send_errors: u64,
}

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every sequence was acknowledged or given up on.
    Completed,
    /// The stop signal fired first.
    Cancelled,
}

/// Summary returned by [`Sender::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub outcome: Outcome,
    pub total_packets: u32,
    /// Sequences acknowledged by the peer.
    pub delivered: u32,
    /// Sequences abandoned after exhausting `max_retries`, ascending.
    pub failed: Vec<u32>,
    pub stats: SenderStats,
    pub elapsed: Duration,
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::Completed => write!(f, "DONE: delivered {} packets", self.delivered)?,
            Outcome::Cancelled => write!(
                f,
                "CANCELLED: delivered {} of {} packets",
                self.delivered, self.total_packets
            )?,
        }
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        write!(
            f,
            "; stats: sends={} retries={} elapsed={}ms",
            self.stats.sends,
            self.stats.retransmissions,
            self.elapsed.as_millis()
        )
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Sliding-window sender for one transfer.
pub struct Sender<C> {
    channel: C,
    peer: SocketAddr,
    config: SenderConfig,
    window: Window,
    stats: SenderStats,
    delivered: u32,
    failed: Vec<u32>,
    started: Instant,
}

impl<C: DatagramChannel> Sender<C> {
    /// Prepare a transfer to `peer` over `channel`.  Nothing is sent yet.
    pub fn new(channel: C, peer: SocketAddr, config: SenderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: Window::new(config.total_packets, config.window_size),
            channel,
            peer,
            config,
            stats: SenderStats::default(),
            delivered: 0,
            failed: Vec::new(),
            started: Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn is_complete(&self) -> bool {
        self.window.is_complete()
    }

    /// Run until every sequence is resolved or `stop` flips to `true`.
    ///
    /// The stop signal is checked between iterations, never mid-phase.
    pub async fn run(mut self, stop: watch::Receiver<bool>) -> TransferReport {
        log::info!(
            "[tx] sliding window start: total={} window={} timeout={}ms peer={}",
            self.config.total_packets,
            self.config.window_size,
            self.config.timeout.as_millis(),
            self.peer
        );
        self.started = Instant::now();

        let outcome = loop {
            if self.window.is_complete() {
                break Outcome::Completed;
            }
            if *stop.borrow() {
                break Outcome::Cancelled;
            }
            self.step().await;
        };

        let report = self.report(outcome);
        match outcome {
            Outcome::Completed => log::info!("[tx] {report}"),
            Outcome::Cancelled => log::warn!("[tx] {report}"),
        }
        report
    }

    /// Snapshot of the transfer so far.
    pub fn report(&self, outcome: Outcome) -> TransferReport {
        TransferReport {
            outcome,
            total_packets: self.config.total_packets,
            delivered: self.delivered,
            failed: self.failed.clone(),
            stats: self.stats,
            elapsed: self.started.elapsed(),
        }
    }

    /// One iteration of fill → receive → advance → retransmit.
    ///
    /// Does nothing once the transfer is complete.
    pub async fn step(&mut self) {
        if self.window.is_complete() {
            return;
        }
        self.fill().await;
        self.receive_one().await;
        self.advance();
        self.retransmit_expired().await;
    }

    async fn fill(&mut self) {
        while let Some(seq) = self.window.next_unsent() {
            self.transmit(seq).await;
            self.window.mark_sent(seq, Instant::now());
            log::debug!("[tx] → DATA seq={seq} in_flight={}", self.window.in_flight());
        }
    }

    async fn receive_one(&mut self) {
        let now = Instant::now();
        let wait = match self.window.next_deadline(self.config.timeout) {
            Some(deadline) => deadline
                .saturating_duration_since(now)
                .min(self.config.poll_interval),
            None => self.config.poll_interval,
        };

        let mut buf = [0u8; MAX_DATAGRAM];
        let received = timeout(wait, self.channel.recv_from(&mut buf)).await;
        match received {
            Err(_elapsed) => {}
            Ok(Ok((n, from))) => self.on_datagram(&buf[..n], from),
            Ok(Err(e)) => {
                // Same as a timeout: nothing arrived.  Finish the wait so a
                // persistently failing channel does not spin the loop.
                log::debug!("[tx] receive error (treated as timeout): {e}");
                tokio::time::sleep_until(now + wait).await;
            }
        }
    }

    fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        if from != self.peer {
            self.stats.ignored += 1;
            log::debug!("[tx] ignoring datagram from stranger {from}");
            return;
        }
        let packet = match Packet::decode(bytes) {
            Ok(p) if p.kind == PacketType::Ack => p,
            Ok(p) => {
                self.stats.ignored += 1;
                log::debug!("[tx] ignoring {} seq={} from {from}", p.kind, p.seq);
                return;
            }
            Err(e) => {
                self.stats.ignored += 1;
                log::debug!("[tx] ignoring malformed datagram from {from}: {e}");
                return;
            }
        };

        match self.window.acknowledge(packet.seq) {
            AckOutcome::Fresh => {
                self.stats.acks += 1;
                self.delivered += 1;
                log::debug!("[tx] ← ACK seq={}", packet.seq);
            }
            AckOutcome::Duplicate => {
                self.stats.duplicate_acks += 1;
                log::debug!("[tx] ← duplicate ACK seq={}", packet.seq);
            }
            AckOutcome::NotInFlight | AckOutcome::OutOfRange => {
                self.stats.ignored += 1;
                log::debug!("[tx] ignoring ACK seq={} outside the window", packet.seq);
            }
        }
    }

    fn advance(&mut self) {
        let passed = self.window.advance();
        for seq in milestones(passed, self.config.progress_interval) {
            log::info!(
                "[tx] delivered up to seq={seq} elapsed={}ms",
                self.started.elapsed().as_millis()
            );
        }
    }

    async fn retransmit_expired(&mut self) {
        let now = Instant::now();
        for seq in self.window.expired(now, self.config.timeout) {
            let transmissions = self.window.transmissions(seq).unwrap_or(0);
            if let Some(max) = self.config.max_retries {
                if transmissions > max {
                    self.window.mark_failed(seq);
                    self.failed.push(seq);
                    log::warn!("[tx] seq={seq} failed after {max} retries");
                    continue;
                }
            }
            self.transmit(seq).await;
            self.window.mark_retransmitted(seq, Instant::now());
            self.stats.retransmissions += 1;
            log::debug!("[tx] timeout, retransmit seq={seq} (attempt {})", transmissions + 1);
        }
    }

    /// Put one DATA packet on the wire.
    ///
    /// A failed send is logged and otherwise treated like a lost datagram:
    /// the caller still records the transmission, so the timeout path
    /// retries it.
    async fn transmit(&mut self, seq: u32) {
        let bytes = Packet::data(seq).encode();
        match self.channel.send_to(&bytes, self.peer).await {
            Ok(()) => self.stats.sends += 1,
            Err(e) => {
                self.stats.send_errors += 1;
                log::warn!("[tx] send of seq={seq} failed: {e}");
            }
        }
    }
}

/// Multiples of `every` among the sequences `base` just moved past.
/// `every == 0` disables milestones.
fn milestones(passed: Range<u32>, every: u32) -> impl Iterator<Item = u32> {
    passed.filter(move |seq| every != 0 && seq % every == 0)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
