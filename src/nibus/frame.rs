//! # NIBUS Frame Encoding and Decoding
//!
//! This module packs and parses the outermost NIBUS binary frame: preamble,
//! packed destination/source addresses, service byte, length, protocol id,
//! payload and a CRC16 trailer. It carries no sub-protocol semantics;
//! the NMS and SARP layers interpret the payload.
//!
//! ## Wire format
//!
//! ```text
//! offset  field        size
//! 0       PREAMBLE     1    0x7E
//! 1-5     destination  5    packed address
//! 6-10    source       5    packed address
//! 11      service      1    0xC0 | prio<<4 | destType<<2 | srcType
//! 12      length       1    payload.len() + 1  (wire quirk, not the length)
//! 13      protocol     1    1 = NMS, 2 = SARP
//! 14..    payload      length-1
//! last-2  CRC16        2    big-endian, over bytes[1..last-2]
//! ```
//!
//! The CRC is the 0x1021 polynomial with zero seed and no reflection
//! (CRC-16/XMODEM). Frames failing the check are dropped by the decoder,
//! never surfaced.

use std::time::Instant;

use crc::{Crc, CRC_16_XMODEM};
use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use crate::constants::{ADDRESS_LENGTH, MAX_DATA_LENGTH, PREAMBLE, SERVICE_INFO_LENGTH};
use crate::error::NibusError;
use crate::nibus::address::Address;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Computes the frame CRC over the given bytes (everything after the
/// preamble, up to the trailer).
pub fn crc16(buf: &[u8]) -> u16 {
    CRC16.checksum(buf)
}

/// A decoded or freshly built NIBUS frame.
///
/// Immutable once constructed; `raw` retains the exact wire bytes for
/// re-verification and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibusDatagram {
    /// 2-bit delivery priority.
    pub priority: u8,
    /// Sub-protocol id (`PROTOCOL_NMS`, `PROTOCOL_SARP`, ...).
    pub protocol: u8,
    pub destination: Address,
    pub source: Address,
    /// Payload bytes (wire length byte minus one).
    pub data: Vec<u8>,
    /// The full wire frame, preamble through CRC.
    pub raw: Vec<u8>,
    /// Monotonic receive timestamp, stamped by the decoder. `None` for
    /// locally built frames.
    pub received_at: Option<Instant>,
}

impl NibusDatagram {
    /// Builds and serializes a frame from its parts.
    pub fn new(
        priority: u8,
        destination: Address,
        source: Address,
        protocol: u8,
        data: Vec<u8>,
    ) -> Result<NibusDatagram, NibusError> {
        if data.len() > MAX_DATA_LENGTH {
            return Err(NibusError::DataTooLong(data.len()));
        }
        let mut raw = Vec::with_capacity(SERVICE_INFO_LENGTH + data.len());
        raw.push(PREAMBLE);
        raw.extend_from_slice(&destination.to_wire());
        raw.extend_from_slice(&source.to_wire());
        raw.push(
            0xC0 | (priority & 3) << 4 | (destination.raw_type() & 3) << 2
                | source.raw_type() & 3,
        );
        // The wire length byte is one more than the payload length. This
        // off-by-one is part of the protocol.
        raw.push(data.len() as u8 + 1);
        raw.push(protocol);
        raw.extend_from_slice(&data);
        let crc = crc16(&raw[1..]);
        raw.extend_from_slice(&crc.to_be_bytes());
        Ok(NibusDatagram {
            priority: priority & 3,
            protocol,
            destination,
            source,
            data,
            raw,
            received_at: None,
        })
    }

    /// Total frame size implied by a wire length byte.
    pub fn frame_length(length_byte: u8) -> usize {
        SERVICE_INFO_LENGTH + length_byte as usize - 1
    }
}

/// Parses one complete frame from the input slice.
///
/// The slice must start at the preamble and contain the whole frame.
/// Fails on short input, bad marker or CRC mismatch; the decoder treats
/// any failure as line noise.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], NibusDatagram> {
    let total = input.len();
    let (i, preamble) = be_u8(input)?;
    if preamble != PREAMBLE || total < SERVICE_INFO_LENGTH {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (i, dest_raw) = take(ADDRESS_LENGTH)(i)?;
    let (i, src_raw) = take(ADDRESS_LENGTH)(i)?;
    let (i, service) = be_u8(i)?;
    let (i, length) = be_u8(i)?;
    let (i, protocol) = be_u8(i)?;

    if length == 0 || total != NibusDatagram::frame_length(length) || total > 255 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::LengthValue,
        )));
    }
    let payload_len = length as usize - 1;
    let (i, payload) = take(payload_len)(i)?;
    let (i, crc_bytes) = take(2usize)(i)?;
    let expected = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
    if crc16(&input[1..total - 2]) != expected {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let dest_type = service >> 2 & 3;
    let src_type = service & 3;
    let mut dest_bytes = [0u8; ADDRESS_LENGTH];
    dest_bytes.copy_from_slice(dest_raw);
    let mut src_bytes = [0u8; ADDRESS_LENGTH];
    src_bytes.copy_from_slice(src_raw);

    Ok((
        i,
        NibusDatagram {
            priority: service >> 4 & 3,
            protocol,
            destination: Address::from_wire(dest_type, &dest_bytes),
            source: Address::from_wire(src_type, &src_bytes),
            data: payload.to_vec(),
            raw: input[..total].to_vec(),
            received_at: Some(Instant::now()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROTOCOL_NMS;

    #[test]
    fn zero_payload_has_length_byte_one() {
        let frame = NibusDatagram::new(
            0,
            Address::Empty,
            Address::Empty,
            PROTOCOL_NMS,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(frame.raw[crate::constants::OFFSET_LENGTH], 1);
        let (_, decoded) = parse_frame(&frame.raw).unwrap();
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn oversized_payload_rejected() {
        let err = NibusDatagram::new(
            0,
            Address::Empty,
            Address::Empty,
            PROTOCOL_NMS,
            vec![0; MAX_DATA_LENGTH + 1],
        );
        assert!(matches!(err, Err(NibusError::DataTooLong(_))));
    }

    #[test]
    fn service_byte_packs_priority_and_types() {
        let frame = NibusDatagram::new(
            2,
            "1.2.3".parse().unwrap(),
            Address::Empty,
            PROTOCOL_NMS,
            vec![1, 2, 3],
        )
        .unwrap();
        let service = frame.raw[crate::constants::OFFSET_SERVICE];
        assert_eq!(service & 0xC0, 0xC0);
        assert_eq!(service >> 4 & 3, 2);
        assert_eq!(service >> 2 & 3, 2); // net destination
        assert_eq!(service & 3, 0); // empty source
    }
}
