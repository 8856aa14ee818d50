//! NIBUS Protocol Constants
//!
//! This module defines the wire-level constants used in the NIBUS protocol
//! implementation: frame marker, field offsets, length limits and the
//! well-known protocol/property identifiers.

/// Frame start marker. Every NIBUS frame begins with this byte.
pub const PREAMBLE: u8 = 0x7E;

/// Offset of the packed destination address within a frame.
pub const OFFSET_DESTINATION: usize = 1;

/// Offset of the packed source address within a frame.
pub const OFFSET_SOURCE: usize = 6;

/// Offset of the service byte: `[1:1][1:1][prio:2][destType:2][srcType:2]`.
pub const OFFSET_SERVICE: usize = 11;

/// Offset of the length byte. The wire value is `payload.len() + 1`.
pub const OFFSET_LENGTH: usize = 12;

/// Offset of the protocol id byte.
pub const OFFSET_PROTOCOL: usize = 13;

/// Offset of the first payload byte.
pub const OFFSET_DATA: usize = 14;

/// Number of CRC trailer bytes (CRC16, big-endian).
pub const CRC_LENGTH: usize = 2;

/// Fixed overhead of a frame: header plus CRC trailer, without payload.
pub const SERVICE_INFO_LENGTH: usize = OFFSET_DATA + CRC_LENGTH;

/// Maximum payload size. Keeps the whole frame within one length byte.
pub const MAX_DATA_LENGTH: usize = 238;

/// Maximum NMS body size expressible in the 6-bit length field.
pub const NMS_MAX_DATA_LENGTH: usize = 63;

/// Packed address width on the wire.
pub const ADDRESS_LENGTH: usize = 5;

/// Protocol id of the NMS sub-protocol.
pub const PROTOCOL_NMS: u8 = 1;

/// Protocol id of the SARP discovery sub-protocol.
pub const PROTOCOL_SARP: u8 = 2;

/// NMS property id of the device version register.
pub const VERSION_ID: u16 = 2;

/// Device type code of the Minihost display controller family.
pub const MINIHOST_TYPE: u16 = 0xABC6;

/// Default reply timeout for NMS requests, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
