//! Sender-side sliding window with per-sequence acknowledgment.
//!
//! [`Window`] tracks which of the sequences `1..=total` are in flight,
//! acknowledged, or not yet sent.  Unlike Go-Back-N, every sequence is
//! acknowledged individually and retransmitted individually.
//!
//! # Protocol contract
//!
//! - Sequences `[base, next_to_send)` have been transmitted at least once.
//! - At most `window_size` sequences starting at `base` are eligible to be in
//!   flight; `next_to_send` never passes `base + window_size` or `total + 1`.
//! - `base` only advances over a contiguous run of resolved slots.  An ACK
//!   for a later sequence is remembered but does not move `base` past an
//!   earlier gap.
//!
//! # Sequence-number layout
//!
//! ```text
//!  base          next_to_send     base + window_size
//!    │                 │                 │
//!  ──┼─────────────────┼─────────────────┼──────▶ seq
//!    │<── in flight ──▶│<── sendable ───▶│
//! ```
//!
//! Slots live in a ring buffer of `min(window_size, total)` entries indexed
//! by sequence number, so memory is bounded by the window rather than by the
//! size of the transfer.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::ops::Range;
use std::time::Duration;

use tokio::time::Instant;

/// State of one sequence inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Not transmitted yet.
    Unsent,
    /// Transmitted, waiting for an ACK.
    InFlight {
        /// Time of the most recent transmission.
        last_sent: Instant,
        /// Total transmissions so far (1 = first send only).
        transmissions: u32,
    },
    Acked { transmissions: u32 },
    /// Gave up after exhausting the retry budget.
    Failed { transmissions: u32 },
}

impl Slot {
    /// Acked and failed slots both let `base` move past them.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Slot::Acked { .. } | Slot::Failed { .. })
    }

    pub fn transmissions(&self) -> u32 {
        match *self {
            Slot::Unsent => 0,
            Slot::InFlight { transmissions, .. }
            | Slot::Acked { transmissions }
            | Slot::Failed { transmissions } => transmissions,
        }
    }
}

/// Result of feeding one ACK into [`Window::acknowledge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// First ACK for an in-flight sequence.
    Fresh,
    /// Sequence was already acknowledged, already left the window, or was
    /// given up on.  State is unchanged.
    Duplicate,
    /// Sequence lies inside `1..=total` but has never been transmitted.
    NotInFlight,
    /// Sequence is 0 or greater than `total`.
    OutOfRange,
}

/// Selective-acknowledgment sliding window for one transfer.
#[derive(Debug, Clone)]
pub struct Window {
    total: u32,
    window_size: u32,
    /// Lowest sequence not yet resolved.
    base: u32,
    /// Lowest sequence never transmitted.
    next_to_send: u32,
    slots: Vec<Slot>,
}

impl Window {
    /// Create a window for sequences `1..=total`.
    ///
    /// # Panics
    ///
    /// Panics if `total` or `window_size` is zero, or `total == u32::MAX`.
    /// [`crate::config::SenderConfig::validate`] rejects all three.
    pub fn new(total: u32, window_size: u32) -> Self {
        assert!(total >= 1, "total must be at least 1");
        assert!(total < u32::MAX, "total must leave room for base = total + 1");
        assert!(window_size >= 1, "window_size must be at least 1");
        let capacity = window_size.min(total) as usize;
        Self {
            total,
            window_size,
            base: 1,
            next_to_send: 1,
            slots: vec![Slot::Unsent; capacity],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_to_send(&self) -> u32 {
        self.next_to_send
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// `true` once every sequence is resolved (`base == total + 1`).
    pub fn is_complete(&self) -> bool {
        self.base > self.total
    }

    /// Exclusive upper bound on sequences that may be transmitted right now.
    fn limit(&self) -> u32 {
        let by_window = u64::from(self.base) + u64::from(self.window_size);
        by_window.min(u64::from(self.total) + 1) as u32
    }

    fn index(&self, seq: u32) -> usize {
        (seq as usize - 1) % self.slots.len()
    }

    /// Slot for `seq` when it lies in `[base, base + window_size)`.
    pub fn slot(&self, seq: u32) -> Option<Slot> {
        if seq < self.base || seq >= self.limit() {
            return None;
        }
        Some(self.slots[self.index(seq)])
    }

    /// Number of transmissions recorded for an in-window sequence.
    pub fn transmissions(&self, seq: u32) -> Option<u32> {
        self.slot(seq).map(|s| s.transmissions())
    }

    /// `true` when `seq` has been acknowledged (or skipped past by `base`).
    pub fn is_acknowledged(&self, seq: u32) -> bool {
        if seq < self.base {
            return seq >= 1;
        }
        matches!(self.slot(seq), Some(Slot::Acked { .. }))
    }

    /// Next sequence the fill phase should transmit, if the window has room.
    pub fn next_unsent(&self) -> Option<u32> {
        (self.next_to_send < self.limit()).then_some(self.next_to_send)
    }

    /// Record the first transmission of `seq` and advance `next_to_send`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode unless `seq` is the value returned by
    /// [`next_unsent`](Self::next_unsent).
    pub fn mark_sent(&mut self, seq: u32, now: Instant) {
        debug_assert_eq!(
            Some(seq),
            self.next_unsent(),
            "mark_sent out of order (next_to_send = {})",
            self.next_to_send
        );
        let i = self.index(seq);
        self.slots[i] = Slot::InFlight {
            last_sent: now,
            transmissions: 1,
        };
        self.next_to_send += 1;
    }

    /// Record an ACK for `seq`.  Acknowledging twice is a no-op.
    pub fn acknowledge(&mut self, seq: u32) -> AckOutcome {
        if seq == 0 || seq > self.total {
            return AckOutcome::OutOfRange;
        }
        if seq < self.base {
            return AckOutcome::Duplicate;
        }
        if seq >= self.next_to_send {
            return AckOutcome::NotInFlight;
        }
        let i = self.index(seq);
        match self.slots[i] {
            Slot::InFlight { transmissions, .. } => {
                self.slots[i] = Slot::Acked { transmissions };
                AckOutcome::Fresh
            }
            Slot::Acked { .. } | Slot::Failed { .. } => AckOutcome::Duplicate,
            Slot::Unsent => unreachable!("seq {seq} below next_to_send but unsent"),
        }
    }

    /// Slide `base` over the contiguous run of resolved slots.
    ///
    /// Returns the sequences `base` moved past (empty when it did not move).
    pub fn advance(&mut self) -> Range<u32> {
        let start = self.base;
        while self.base <= self.total && self.base < self.next_to_send {
            let i = self.index(self.base);
            if !self.slots[i].is_resolved() {
                break;
            }
            self.slots[i] = Slot::Unsent;
            self.base += 1;
        }
        start..self.base
    }

    /// In-flight sequences whose last transmission is at least `timeout` old,
    /// in ascending order.
    pub fn expired(&self, now: Instant, timeout: Duration) -> Vec<u32> {
        (self.base..self.next_to_send)
            .filter(|&seq| match self.slots[self.index(seq)] {
                Slot::InFlight { last_sent, .. } => {
                    now.saturating_duration_since(last_sent) >= timeout
                }
                _ => false,
            })
            .collect()
    }

    /// Earliest instant at which some in-flight sequence expires.
    ///
    /// Returns `None` when nothing is in flight.
    pub fn next_deadline(&self, timeout: Duration) -> Option<Instant> {
        (self.base..self.next_to_send)
            .filter_map(|seq| match self.slots[self.index(seq)] {
                Slot::InFlight { last_sent, .. } => Some(last_sent + timeout),
                _ => None,
            })
            .min()
    }

    /// Number of sequences transmitted but not yet resolved.
    pub fn in_flight(&self) -> usize {
        (self.base..self.next_to_send)
            .filter(|&seq| matches!(self.slots[self.index(seq)], Slot::InFlight { .. }))
            .count()
    }

    /// Refresh the send time of an in-flight `seq` after retransmitting it.
    ///
    /// Returns the new transmission count, or `None` if `seq` is not in flight.
    pub fn mark_retransmitted(&mut self, seq: u32, now: Instant) -> Option<u32> {
        if seq < self.base || seq >= self.next_to_send {
            return None;
        }
        let i = self.index(seq);
        match &mut self.slots[i] {
            Slot::InFlight {
                last_sent,
                transmissions,
            } => {
                *last_sent = now;
                *transmissions += 1;
                Some(*transmissions)
            }
            _ => None,
        }
    }

    /// Give up on an in-flight `seq`.  Returns `false` if it was not in flight.
    pub fn mark_failed(&mut self, seq: u32) -> bool {
        if seq < self.base || seq >= self.next_to_send {
            return false;
        }
        let i = self.index(seq);
        match self.slots[i] {
            Slot::InFlight { transmissions, .. } => {
                self.slots[i] = Slot::Failed { transmissions };
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Send everything the window currently allows.
    fn fill(w: &mut Window, now: Instant) -> Vec<u32> {
        let mut sent = Vec::new();
        while let Some(seq) = w.next_unsent() {
            w.mark_sent(seq, now);
            sent.push(seq);
        }
        sent
    }

    fn assert_invariant(w: &Window) {
        assert!(1 <= w.base());
        assert!(w.base() <= w.next_to_send());
        assert!(w.next_to_send() <= (w.total() + 1).min(w.base() + w.window_size()));
    }

    #[test]
    fn initial_state() {
        let w = Window::new(10, 4);
        assert_eq!(w.base(), 1);
        assert_eq!(w.next_to_send(), 1);
        assert_eq!(w.next_unsent(), Some(1));
        assert_eq!(w.in_flight(), 0);
        assert!(!w.is_complete());
        assert_invariant(&w);
    }

    #[test]
    fn fill_stops_at_window_edge() {
        let mut w = Window::new(10, 4);
        assert_eq!(fill(&mut w, Instant::now()), vec![1, 2, 3, 4]);
        assert_eq!(w.next_unsent(), None);
        assert_eq!(w.in_flight(), 4);
        assert_invariant(&w);
    }

    #[test]
    fn fill_stops_at_total() {
        let mut w = Window::new(3, 8);
        assert_eq!(fill(&mut w, Instant::now()), vec![1, 2, 3]);
        assert_eq!(w.next_to_send(), 4);
        assert_invariant(&w);
    }

    #[test]
    fn ack_in_order_slides_window() {
        let mut w = Window::new(10, 4);
        fill(&mut w, Instant::now());

        assert_eq!(w.acknowledge(1), AckOutcome::Fresh);
        assert_eq!(w.advance(), 1..2);
        assert_eq!(w.base(), 2);
        assert_eq!(w.next_unsent(), Some(5));
        assert_invariant(&w);
    }

    #[test]
    fn out_of_order_ack_does_not_cross_gap() {
        let mut w = Window::new(5, 3);
        fill(&mut w, Instant::now());

        assert_eq!(w.acknowledge(2), AckOutcome::Fresh);
        assert_eq!(w.acknowledge(3), AckOutcome::Fresh);
        assert!(w.advance().is_empty());
        assert_eq!(w.base(), 1);
        assert!(w.is_acknowledged(2));
        assert!(!w.is_acknowledged(1));

        assert_eq!(w.acknowledge(1), AckOutcome::Fresh);
        assert_eq!(w.advance(), 1..4);
        assert_eq!(w.base(), 4);
        assert_invariant(&w);
    }

    #[test]
    fn duplicate_ack_is_idempotent() {
        let mut once = Window::new(10, 4);
        let mut twice = Window::new(10, 4);
        let now = Instant::now();
        fill(&mut once, now);
        fill(&mut twice, now);

        once.acknowledge(3);
        twice.acknowledge(3);
        assert_eq!(twice.acknowledge(3), AckOutcome::Duplicate);

        assert_eq!(once.slot(3), twice.slot(3));
        assert_eq!(once.base(), twice.base());
        assert_eq!(once.next_to_send(), twice.next_to_send());
    }

    #[test]
    fn ack_below_base_is_duplicate() {
        let mut w = Window::new(10, 4);
        fill(&mut w, Instant::now());
        w.acknowledge(1);
        w.advance();
        assert_eq!(w.acknowledge(1), AckOutcome::Duplicate);
        assert!(w.is_acknowledged(1));
    }

    #[test]
    fn ack_for_unsent_or_invalid_sequence_ignored() {
        let mut w = Window::new(10, 4);
        fill(&mut w, Instant::now());
        assert_eq!(w.acknowledge(7), AckOutcome::NotInFlight);
        assert_eq!(w.acknowledge(0), AckOutcome::OutOfRange);
        assert_eq!(w.acknowledge(11), AckOutcome::OutOfRange);
        assert_eq!(w.base(), 1);
        assert_eq!(w.in_flight(), 4);
    }

    #[test]
    fn expired_reports_only_old_in_flight_slots() {
        let t0 = Instant::now();
        let mut w = Window::new(10, 4);
        w.mark_sent(1, t0);
        w.mark_sent(2, t0 + Duration::from_millis(60));
        w.mark_sent(3, t0);
        w.acknowledge(3);

        assert!(w.expired(t0 + Duration::from_millis(99), TIMEOUT).is_empty());
        assert_eq!(w.expired(t0 + TIMEOUT, TIMEOUT), vec![1]);
        assert_eq!(w.expired(t0 + Duration::from_millis(160), TIMEOUT), vec![1, 2]);
    }

    #[test]
    fn retransmit_refreshes_timestamp_and_counts() {
        let t0 = Instant::now();
        let mut w = Window::new(1, 1);
        w.mark_sent(1, t0);

        let t1 = t0 + TIMEOUT;
        assert_eq!(w.expired(t1, TIMEOUT), vec![1]);
        assert_eq!(w.mark_retransmitted(1, t1), Some(2));
        assert!(w.expired(t1, TIMEOUT).is_empty());
        assert_eq!(w.next_deadline(TIMEOUT), Some(t1 + TIMEOUT));
        assert_eq!(w.transmissions(1), Some(2));
    }

    #[test]
    fn next_deadline_is_earliest_in_flight() {
        let t0 = Instant::now();
        let mut w = Window::new(10, 4);
        assert_eq!(w.next_deadline(TIMEOUT), None);
        w.mark_sent(1, t0 + Duration::from_millis(30));
        w.mark_sent(2, t0);
        assert_eq!(w.next_deadline(TIMEOUT), Some(t0 + TIMEOUT));
        w.acknowledge(2);
        assert_eq!(
            w.next_deadline(TIMEOUT),
            Some(t0 + Duration::from_millis(130))
        );
    }

    #[test]
    fn failed_slot_lets_base_advance() {
        let mut w = Window::new(3, 3);
        fill(&mut w, Instant::now());
        assert!(w.mark_failed(1));
        w.acknowledge(2);
        assert_eq!(w.advance(), 1..3);
        assert!(!w.mark_failed(1), "already behind base");
        assert_eq!(w.base(), 3);
    }

    #[test]
    fn ack_after_failure_is_duplicate() {
        let mut w = Window::new(3, 3);
        fill(&mut w, Instant::now());
        w.mark_failed(2);
        assert_eq!(w.acknowledge(2), AckOutcome::Duplicate);
        assert!(matches!(w.slot(2), Some(Slot::Failed { .. })));
    }

    #[test]
    fn ring_buffer_reuses_slots_across_many_sequences() {
        let now = Instant::now();
        let mut w = Window::new(1_000, 4);
        while !w.is_complete() {
            fill(&mut w, now);
            let seq = w.base();
            assert_eq!(w.transmissions(seq), Some(1));
            w.acknowledge(seq);
            w.advance();
            assert_invariant(&w);
        }
        assert_eq!(w.base(), 1_001);
        assert_eq!(w.next_unsent(), None);
    }

    #[test]
    fn completes_at_total_plus_one() {
        let mut w = Window::new(2, 2);
        fill(&mut w, Instant::now());
        w.acknowledge(2);
        w.acknowledge(1);
        assert_eq!(w.advance(), 1..3);
        assert!(w.is_complete());
        assert_eq!(w.in_flight(), 0);
        assert_eq!(w.next_deadline(TIMEOUT), None);
    }
}
