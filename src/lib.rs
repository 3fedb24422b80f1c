//! `udp-arq` — selective-acknowledgment sliding-window ARQ over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────────────┐     DATA(seq)      ┌───────────────────┐
//!  │      Sender       │───────────────────▶│     Receiver      │
//!  │  ┌─────────────┐  │                    │  ┌─────────────┐  │
//!  │  │   Window    │  │      ACK(seq)      │  │   SeenSet   │  │
//!  │  │ (ring of W) │  │◀───────────────────│  │ LossPolicy  │  │
//!  │  └─────────────┘  │                    │  └─────────────┘  │
//!  └─────────┬─────────┘                    └─────────┬─────────┘
//!            │          DatagramChannel               │
//!  ┌─────────▼────────────────────────────────────────▼─────────┐
//!  │  Socket (tokio UdpSocket)  │  MemoryChannel  │  Simulator   │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every DATA packet is acknowledged individually; the sender's window only
//! slides past a sequence once that sequence itself has been acknowledged.
//!
//! Each module has a single responsibility:
//! - [`packet`]    — 12-byte wire format (encode / decode)
//! - [`window`]    — sender bookkeeping: base, next-to-send, per-slot state
//! - [`sender`]    — the fill / receive / advance / retransmit loop
//! - [`receiver`]  — validation, duplicate detection, ACK decision
//! - [`loss`]      — injectable drop decisions
//! - [`config`]    — tunables and their validation
//! - [`socket`]    — datagram channel seam and the UDP implementation
//! - [`simulator`] — in-memory links and fault injection for testing

pub mod config;
pub mod loss;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod window;

pub use config::{ConfigError, ReceiverConfig, SenderConfig, DEFAULT_PORT};
pub use packet::{Packet, PacketError, PacketType};
pub use receiver::{Receiver, ReceiverError, ReceiverStats, Verdict};
pub use sender::{Outcome, Sender, SenderStats, TransferReport};
pub use socket::{DatagramChannel, Socket, SocketError};
pub use window::Window;
