//! Receive side: validation, duplicate detection, acknowledgment decision.
//!
//! [`Receiver`] acknowledges every structurally valid DATA packet unless its
//! [`LossPolicy`] says to suppress the ACK:
//!
//! - Datagrams that fail to decode, and packets that are not DATA, are
//!   discarded without a response.
//! - Every other packet is classified as a first delivery or a duplicate via
//!   the [`SeenSet`].  The classification is reported but never changes the
//!   acknowledgment decision: a retransmission is exactly as eligible for an
//!   ACK as the first copy, because it is the ACK that may have been lost.
//! - Sequence numbers are not range-checked and ordering is not enforced.
//!
//! The seen-set lives as long as the `Receiver` itself, not per sender
//! session.  A sender that restarts and reuses sequence numbers against the
//! same receiver sees its packets classified as duplicates.  They are still
//! acknowledged, so delivery is unaffected; only the first/duplicate
//! classification is wrong.  Call [`Receiver::reset_seen`] when the embedding
//! application knows a new session started.
//!
//! [`Receiver::handle`] is pure state; [`Receiver::serve`] drives it over a
//! [`DatagramChannel`].

use std::collections::HashSet;

use thiserror::Error;
use tokio::sync::watch;

use crate::loss::LossPolicy;
use crate::packet::{Packet, PacketError, PacketType};
use crate::socket::{DatagramChannel, MAX_DATAGRAM};

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Whether a DATA packet's sequence was seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    First,
    Duplicate,
}

/// Why a datagram produced no response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    Malformed(PacketError),
    /// Well-formed, but not a DATA packet.
    NotData(PacketType),
}

/// Outcome of handling one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Discard(Discard),
    /// Valid DATA whose ACK the loss policy chose to drop.
    Suppress { seq: u32, delivery: Delivery },
    /// Valid DATA; send `ack` back to the originating address.
    Ack { ack: Packet, delivery: Delivery },
}

// ---------------------------------------------------------------------------
// SeenSet
// ---------------------------------------------------------------------------

/// Sequence numbers observed in at least one DATA packet.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    seqs: HashSet<u32>,
}

impl SeenSet {
    /// Record `seq`; returns whether this was its first sighting.
    pub fn observe(&mut self, seq: u32) -> Delivery {
        if self.seqs.insert(seq) {
            Delivery::First
        } else {
            Delivery::Duplicate
        }
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.seqs.contains(&seq)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn clear(&mut self) {
        self.seqs.clear();
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Running totals for one receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams read from the channel, valid or not.
    pub datagrams: u64,
    pub first_deliveries: u64,
    pub duplicates: u64,
    pub acks_sent: u64,
    /// ACKs withheld by the loss policy.
    pub acks_suppressed: u64,
    pub discarded: u64,
}

/// Errors that end [`Receiver::serve`].
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("channel closed: {0}")]
    ChannelClosed(#[source] std::io::Error),
}

/// Receive-side state for one receiver process.
#[derive(Debug)]
pub struct Receiver<L> {
    policy: L,
    seen: SeenSet,
    stats: ReceiverStats,
}

impl<L: LossPolicy> Receiver<L> {
    pub fn new(policy: L) -> Self {
        Self {
            policy,
            seen: SeenSet::default(),
            stats: ReceiverStats::default(),
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Forget every sequence seen so far.
    pub fn reset_seen(&mut self) {
        self.seen.clear();
    }

    /// Process one inbound datagram and decide what to send back.
    pub fn handle(&mut self, datagram: &[u8]) -> Verdict {
        self.stats.datagrams += 1;

        let packet = match Packet::decode(datagram) {
            Ok(p) => p,
            Err(e) => {
                self.stats.discarded += 1;
                log::debug!("[rx] discard malformed datagram: {e}");
                return Verdict::Discard(Discard::Malformed(e));
            }
        };
        if packet.kind != PacketType::Data {
            self.stats.discarded += 1;
            log::debug!("[rx] discard {} seq={}", packet.kind, packet.seq);
            return Verdict::Discard(Discard::NotData(packet.kind));
        }

        let seq = packet.seq;
        let delivery = self.seen.observe(seq);
        match delivery {
            Delivery::First => {
                self.stats.first_deliveries += 1;
                log::info!("[rx] DATA seq={seq}");
            }
            Delivery::Duplicate => {
                self.stats.duplicates += 1;
                log::info!("[rx] DUPLICATE seq={seq} (retransmit)");
            }
        }

        if self.policy.should_drop() {
            self.stats.acks_suppressed += 1;
            log::info!("[rx] (drop) ACK seq={seq}");
            return Verdict::Suppress { seq, delivery };
        }

        Verdict::Ack {
            ack: Packet::ack(seq),
            delivery,
        }
    }

    /// Serve datagrams from `channel` until `stop` flips to `true` (or its
    /// sender is dropped).
    ///
    /// Transient receive and send errors are logged and skipped; only a
    /// channel that can no longer deliver anything ends the loop with an
    /// error.
    pub async fn serve<C: DatagramChannel>(
        &mut self,
        channel: &C,
        mut stop: watch::Receiver<bool>,
    ) -> Result<ReceiverStats, ReceiverError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        log::info!("[rx] listening on {}", channel.local_addr());

        loop {
            if *stop.borrow() {
                break;
            }
            let received = tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                result = channel.recv_from(&mut buf) => result,
            };

            let (n, from) = match received {
                Ok(v) => v,
                Err(e) if is_fatal(&e) => return Err(ReceiverError::ChannelClosed(e)),
                Err(e) => {
                    log::debug!("[rx] receive error (ignored): {e}");
                    continue;
                }
            };

            if let Verdict::Ack { ack, .. } = self.handle(&buf[..n]) {
                match channel.send_to(&ack.encode(), from).await {
                    Ok(()) => {
                        self.stats.acks_sent += 1;
                        log::info!("[rx] ACK seq={}", ack.seq);
                    }
                    Err(e) => log::warn!("[rx] failed to send ACK seq={}: {e}", ack.seq),
                }
            }
        }

        log::info!("[rx] stopped: {:?}", self.stats);
        Ok(self.stats)
    }
}

/// Errors after which the channel will never produce another datagram.
fn is_fatal(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::ConnectionAborted
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
