//! The nms module implements the Network Management Service sub-protocol:
//! datagram layout, typed value codec and the request builders used by the
//! connection layer.

pub mod datagram;
pub mod service;
pub mod value;

pub use datagram::{NmsDatagram, NmsOptions};
pub use service::NmsServiceType;
pub use value::{decode_value, NmsValue, NmsValueType};

use crate::error::NibusError;
use crate::nibus::address::Address;

/// Most property ids a single batch read can carry.
pub const MAX_BATCH_READ: usize = 21;

/// Builds a `Read` request for one or more property ids.
///
/// The first id goes into the correlation id field; every further id is
/// packed as a 3-byte sub-request in the body, which is what makes the
/// device answer with one datagram per id (a batch read).
pub fn create_nms_read(destination: Address, ids: &[u16]) -> Result<NmsDatagram, NibusError> {
    if ids.is_empty() || ids.len() > MAX_BATCH_READ {
        return Err(NibusError::TooManyProperties(ids.len()));
    }
    let (first, rest) = ids.split_first().expect("ids checked non-empty");
    let mut nms = Vec::with_capacity(rest.len() * 3);
    for id in rest {
        nms.push((NmsServiceType::Read as u8) << 3 | (id >> 8) as u8 & 3);
        nms.push(*id as u8);
        nms.push(0);
    }
    NmsDatagram::new(NmsOptions {
        destination,
        id: *first,
        service: NmsServiceType::Read,
        nms,
        ..Default::default()
    })
}

/// Builds a `Write` request setting one property.
pub fn create_nms_write(
    destination: Address,
    id: u16,
    value: &NmsValue,
    not_reply: bool,
) -> Result<NmsDatagram, NibusError> {
    let mut nms = vec![value.value_type() as u8];
    nms.extend(value.to_bytes());
    NmsDatagram::new(NmsOptions {
        destination,
        id,
        service: NmsServiceType::Write,
        nms,
        not_reply,
        ..Default::default()
    })
}

/// Builds an unsolicited `InformationReport` carrying one property value.
/// Devices use these for spontaneous telemetry; handy for simulators too.
pub fn create_nms_information_report(
    source: Address,
    destination: Address,
    id: u16,
    value: &NmsValue,
) -> Result<NmsDatagram, NibusError> {
    let mut nms = vec![value.value_type() as u8];
    nms.extend(value.to_bytes());
    NmsDatagram::new(NmsOptions {
        destination,
        source,
        id,
        service: NmsServiceType::InformationReport,
        nms,
        not_reply: true,
        ..Default::default()
    })
}
