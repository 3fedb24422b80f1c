//! Wire-format definitions for ARQ datagrams.
//!
//! Every datagram exchanged between sender and receiver is exactly one
//! [`Packet`].  This module is responsible for:
//! - Defining the on-wire binary layout (magic, type, reserved, sequence).
//! - Serialising a [`Packet`] into a fixed-size byte block.
//! - Deserialising a raw byte slice back into a [`Packet`], returning a
//!   [`PacketError`] for anything that does not belong to this protocol.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **little-endian**.  Existing peers copy a
//! packed header struct straight onto the wire from x86 hosts, so this is the
//! byte order they actually emit; the magic shows up on the wire as `"STAJ"`.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             Magic                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Type              |           Reserved            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 12 bytes.  There is no payload.

use thiserror::Error;

/// Protocol identifier carried in every header.
pub const MAGIC: u32 = 0x4A41_5453;

/// Byte length of a datagram on the wire.
pub const HEADER_LEN: usize = 12;

// Byte offsets of each field within the serialised header.
const OFF_MAGIC: usize = 0;
const OFF_TYPE: usize = 4;
const OFF_RESERVED: usize = 6;
const OFF_SEQ: usize = 8;

/// Packet type carried in the `type` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Data,
    Ack,
}

impl PacketType {
    /// Wire value of this type.
    pub fn code(self) -> u16 {
        match self {
            PacketType::Data => 1,
            PacketType::Ack => 2,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(PacketType::Data),
            2 => Some(PacketType::Ack),
            _ => None,
        }
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketType::Data => f.write_str("DATA"),
            PacketType::Ack => f.write_str("ACK"),
        }
    }
}

/// One protocol datagram.
///
/// The magic constant is implicit: every `Packet` value is valid by
/// construction and [`Packet::encode`] always writes [`MAGIC`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    /// Unused by the protocol; preserved verbatim through encode/decode.
    pub reserved: u16,
    /// 1-based packet index assigned by the sender.
    pub seq: u32,
}

impl Packet {
    /// Build a packet with `reserved = 0`.
    pub fn new(kind: PacketType, seq: u32) -> Self {
        Self {
            kind,
            reserved: 0,
            seq,
        }
    }

    pub fn data(seq: u32) -> Self {
        Self::new(PacketType::Data, seq)
    }

    pub fn ack(seq: u32) -> Self {
        Self::new(PacketType::Ack, seq)
    }

    pub fn with_reserved(mut self, reserved: u16) -> Self {
        self.reserved = reserved;
        self
    }

    /// Serialise this packet into its fixed-size wire block.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[OFF_TYPE..OFF_TYPE + 2].copy_from_slice(&self.kind.code().to_le_bytes());
        buf[OFF_RESERVED..OFF_RESERVED + 2].copy_from_slice(&self.reserved.to_le_bytes());
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seq.to_le_bytes());
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is not exactly [`HEADER_LEN`] bytes,
    /// - the magic field is not [`MAGIC`], or
    /// - the type field is neither DATA nor ACK.
    ///
    /// The sequence number is not range-checked; that is the caller's job.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let buf: &[u8; HEADER_LEN] =
            buf.try_into().map_err(|_| PacketError::LengthMismatch {
                expected: HEADER_LEN,
                actual: buf.len(),
            })?;

        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != MAGIC {
            return Err(PacketError::BadMagic(magic));
        }

        let code = u16::from_le_bytes([buf[OFF_TYPE], buf[OFF_TYPE + 1]]);
        let kind = PacketType::from_code(code).ok_or(PacketError::UnknownType(code))?;
        let reserved = u16::from_le_bytes([buf[OFF_RESERVED], buf[OFF_RESERVED + 1]]);
        let seq = u32::from_le_bytes([
            buf[OFF_SEQ],
            buf[OFF_SEQ + 1],
            buf[OFF_SEQ + 2],
            buf[OFF_SEQ + 3],
        ]);

        Ok(Packet {
            kind,
            reserved,
            seq,
        })
    }
}

/// Reasons a datagram is rejected by [`Packet::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("datagram is {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unknown packet type {0}")]
    UnknownType(u16),
}
