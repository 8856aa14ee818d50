//! # NMS Datagram
//!
//! The Network Management Service sub-protocol rides inside a NIBUS frame
//! with protocol id 1. Its three header bytes carry the service code, the
//! response flag, a 10-bit correlation id and a no-reply flag:
//!
//! ```text
//! byte0   [service:5][isResponse:1][idHi:2]
//! byte1   idLo
//! byte2   [notReply:1][reserved:1][length:6]
//! byte3.. service-specific body
//! ```
//!
//! The `Read` service reuses the 6-bit length field for batch semantics, so
//! its true body length is inferred from the frame size (`data.len() - 3`)
//! instead. Do not "normalize" this: batch reads depend on it.

use std::time::Duration;

use crate::constants::{NMS_MAX_DATA_LENGTH, PROTOCOL_NMS};
use crate::error::NibusError;
use crate::nibus::address::Address;
use crate::nibus::frame::NibusDatagram;
use crate::nms::service::NmsServiceType;
use crate::nms::value::{decode_value, NmsValue, NmsValueType};

/// Construction parameters for an [`NmsDatagram`].
#[derive(Debug, Clone)]
pub struct NmsOptions {
    pub destination: Address,
    /// Defaults to the empty (auto) address for host-originated requests.
    pub source: Address,
    pub priority: u8,
    pub id: u16,
    pub service: NmsServiceType,
    pub nms: Vec<u8>,
    pub is_response: bool,
    pub not_reply: bool,
    /// Per-request reply timeout override.
    pub timeout: Option<Duration>,
}

impl Default for NmsOptions {
    fn default() -> Self {
        NmsOptions {
            destination: Address::Empty,
            source: Address::Empty,
            priority: 0,
            id: 0,
            service: NmsServiceType::None,
            nms: Vec::new(),
            is_response: false,
            not_reply: false,
            timeout: None,
        }
    }
}

/// An NMS view over a NIBUS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmsDatagram {
    pub frame: NibusDatagram,
    /// 10-bit correlation id.
    pub id: u16,
    pub service: NmsServiceType,
    pub is_response: bool,
    pub not_reply: bool,
    /// Service-specific body bytes.
    pub nms: Vec<u8>,
    pub timeout: Option<Duration>,
}

impl NmsDatagram {
    /// Builds and serializes an NMS datagram.
    pub fn new(options: NmsOptions) -> Result<NmsDatagram, NibusError> {
        if options.nms.len() > NMS_MAX_DATA_LENGTH {
            return Err(NibusError::DataTooLong(options.nms.len()));
        }
        // Batch reads carry their length implicitly; everything else uses
        // the 6-bit field.
        let nms_length = if options.service == NmsServiceType::Read {
            0
        } else {
            options.nms.len() as u8 & 0x3F
        };
        let mut data = Vec::with_capacity(3 + options.nms.len());
        data.push(
            (options.service as u8 & 0x1F) << 3
                | u8::from(options.is_response) << 2
                | (options.id >> 8) as u8 & 3,
        );
        data.push(options.id as u8);
        data.push(u8::from(options.not_reply) << 7 | nms_length);
        data.extend_from_slice(&options.nms);

        let frame = NibusDatagram::new(
            options.priority,
            options.destination,
            options.source,
            PROTOCOL_NMS,
            data,
        )?;
        Ok(NmsDatagram {
            frame,
            id: options.id & 0x3FF,
            service: options.service,
            is_response: options.is_response,
            not_reply: options.not_reply,
            nms: options.nms,
            timeout: options.timeout,
        })
    }

    /// Whether a decoded frame can be interpreted as NMS.
    pub fn is_nms_frame(frame: &NibusDatagram) -> bool {
        frame.protocol == PROTOCOL_NMS && frame.data.len() >= 3
    }

    /// Reinterprets a decoded NIBUS frame as an NMS datagram.
    pub fn from_frame(frame: NibusDatagram) -> Option<NmsDatagram> {
        if !Self::is_nms_frame(&frame) {
            return None;
        }
        let data = &frame.data;
        let id = u16::from(data[0] & 3) << 8 | u16::from(data[1]);
        let service = NmsServiceType::from_u8(data[0] >> 3)?;
        let is_response = data[0] & 4 != 0;
        let not_reply = data[2] & 0x80 != 0;
        let nms_length = if service == NmsServiceType::Read {
            data.len() - 3
        } else {
            (data[2] & 0x3F) as usize
        };
        // A declared length past the end of the payload is clamped, not
        // rejected; the typed accessors bounds-check on their own.
        let nms = data[3..(3 + nms_length).min(data.len())].to_vec();
        Some(NmsDatagram {
            id,
            service,
            is_response,
            not_reply,
            nms,
            timeout: None,
            frame,
        })
    }

    /// The value type declared by the body, when the service carries one.
    pub fn value_type(&self) -> Option<NmsValueType> {
        match self.service {
            NmsServiceType::Read => {
                if self.nms.len() > 2 {
                    NmsValueType::from_u8(self.nms[1])
                } else {
                    None
                }
            }
            NmsServiceType::InformationReport => {
                NmsValueType::from_u8(*self.nms.first()?)
            }
            NmsServiceType::UploadSegment
            | NmsServiceType::RequestDomainUpload
            | NmsServiceType::RequestDomainDownload => Some(NmsValueType::UInt32),
            _ => None,
        }
    }

    /// The status byte of a response, if present.
    pub fn status(&self) -> Option<i8> {
        if self.nms.is_empty() || !self.is_response {
            return None;
        }
        Some(self.nms[0] as i8)
    }

    /// Decodes the typed value at the service-specific offset.
    ///
    /// Fails closed: a body too short for the declared type yields `None`.
    pub fn value(&self) -> Option<NmsValue> {
        let value_type = self.value_type()?;
        match self.service {
            NmsServiceType::Read => decode_value(value_type, &self.nms, 2),
            NmsServiceType::InformationReport => decode_value(value_type, &self.nms, 1),
            NmsServiceType::RequestDomainUpload | NmsServiceType::RequestDomainDownload => {
                decode_value(value_type, &self.nms, 1)
            }
            NmsServiceType::UploadSegment => {
                let offset = match decode_value(NmsValueType::UInt32, &self.nms, 1)? {
                    NmsValue::UInt32(v) => v,
                    _ => return None,
                };
                Some(NmsValue::UploadSegment {
                    offset,
                    data: self.nms.get(5..).unwrap_or_default().to_vec(),
                })
            }
            _ => None,
        }
    }

    /// Whether this datagram answers the given request.
    ///
    /// A reply matches when the service agrees, the response flag is set and
    /// either the reply's source equals the request's destination, or the
    /// correlation ids agree and the request was sent to the empty address
    /// (the broadcast-reply exception).
    pub fn is_response_for(&self, req: &NmsDatagram) -> bool {
        self.is_response
            && self.service == req.service
            && (self.frame.source == req.frame.destination
                || (self.id == req.id && req.frame.destination.is_empty()))
    }
}
