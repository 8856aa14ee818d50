//! # SARP Discovery Sub-protocol
//!
//! SARP (Search/ARP) datagrams are broadcast to enumerate devices on a bus
//! segment. A query names a match pattern (everything, a device type, a
//! group mask or a net address); each matching device answers with an
//! unsolicited response naming its MAC and declared type. Replies are
//! never correlated to the query; they arrive on the connection's event
//! stream.
//!
//! Payload layout (protocol id 2, 11 bytes):
//!
//! ```text
//! byte0    [isResponse:1][reserved:3][queryType:4]
//! byte1-5  query param / match pattern
//! byte6-10 responder MAC (zero in queries)
//! ```
//!
//! For `ByType` queries the type code occupies the low two pattern bytes,
//! big-endian; responses echo it there, which is where `device_type`
//! comes from.

use crate::constants::{ADDRESS_LENGTH, PROTOCOL_SARP};
use crate::error::NibusError;
use crate::nibus::address::Address;
use crate::nibus::frame::NibusDatagram;

/// Fixed SARP payload size.
pub const SARP_DATA_LENGTH: usize = 1 + 2 * ADDRESS_LENGTH;

/// SARP query kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SarpQueryType {
    All = 0,
    ByType = 1,
    ByNet = 2,
    ByGroup = 3,
}

impl SarpQueryType {
    pub fn from_u8(value: u8) -> Option<SarpQueryType> {
        let qt = match value {
            0 => SarpQueryType::All,
            1 => SarpQueryType::ByType,
            2 => SarpQueryType::ByNet,
            3 => SarpQueryType::ByGroup,
            _ => return None,
        };
        Some(qt)
    }
}

/// A SARP view over a NIBUS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SarpDatagram {
    pub frame: NibusDatagram,
    pub is_response: bool,
    pub query_type: SarpQueryType,
    /// 5-byte match pattern.
    pub query_param: [u8; ADDRESS_LENGTH],
    /// Responder hardware address; zero in queries.
    pub mac: [u8; ADDRESS_LENGTH],
}

impl SarpDatagram {
    /// Whether a decoded frame can be interpreted as SARP.
    pub fn is_sarp_frame(frame: &NibusDatagram) -> bool {
        frame.protocol == PROTOCOL_SARP && frame.data.len() == SARP_DATA_LENGTH
    }

    /// Reinterprets a decoded NIBUS frame as a SARP datagram.
    pub fn from_frame(frame: NibusDatagram) -> Option<SarpDatagram> {
        if !Self::is_sarp_frame(&frame) {
            return None;
        }
        let data = &frame.data;
        let query_type = SarpQueryType::from_u8(data[0] & 0x0F)?;
        let mut query_param = [0u8; ADDRESS_LENGTH];
        query_param.copy_from_slice(&data[1..1 + ADDRESS_LENGTH]);
        let mut mac = [0u8; ADDRESS_LENGTH];
        mac.copy_from_slice(&data[1 + ADDRESS_LENGTH..SARP_DATA_LENGTH]);
        Some(SarpDatagram {
            is_response: data[0] & 0x80 != 0,
            query_type,
            query_param,
            mac,
            frame,
        })
    }

    /// The device type a response declares (low two pattern bytes).
    pub fn device_type(&self) -> Option<u16> {
        if !self.is_response {
            return None;
        }
        Some(u16::from_be_bytes([
            self.query_param[3],
            self.query_param[4],
        ]))
    }
}

fn build(
    is_response: bool,
    query_type: SarpQueryType,
    query_param: [u8; ADDRESS_LENGTH],
    mac: [u8; ADDRESS_LENGTH],
    destination: Address,
    source: Address,
) -> Result<SarpDatagram, NibusError> {
    let mut data = Vec::with_capacity(SARP_DATA_LENGTH);
    data.push(u8::from(is_response) << 7 | query_type as u8);
    data.extend_from_slice(&query_param);
    data.extend_from_slice(&mac);
    let frame = NibusDatagram::new(0, destination, source, PROTOCOL_SARP, data)?;
    Ok(SarpDatagram {
        frame,
        is_response,
        query_type,
        query_param,
        mac,
    })
}

/// Builds a broadcast SARP query.
pub fn create_sarp(
    query_type: SarpQueryType,
    query_param: [u8; ADDRESS_LENGTH],
) -> Result<SarpDatagram, NibusError> {
    build(
        false,
        query_type,
        query_param,
        [0; ADDRESS_LENGTH],
        Address::broadcast(),
        Address::Empty,
    )
}

/// Builds the response a device sends to a matching query. Used by bus
/// simulators and tests.
pub fn create_sarp_response(
    query_type: SarpQueryType,
    device_type: u16,
    mac: [u8; ADDRESS_LENGTH],
) -> Result<SarpDatagram, NibusError> {
    let param = [0, 0, 0, (device_type >> 8) as u8, device_type as u8];
    build(
        true,
        query_type,
        param,
        mac,
        Address::Empty,
        Address::Mac(mac),
    )
}
