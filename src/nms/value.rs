//! Typed NMS value encoding and decoding.
//!
//! Property values travel as a one-byte type tag followed by a
//! little-endian scalar (strings are NUL-terminated). Decoding is strictly
//! bounds-checked: a short buffer yields `None`, never a partial read.

/// NMS value type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NmsValueType {
    Unknown = 0,
    Int16 = 2,
    Int32 = 3,
    Real32 = 4,
    Real64 = 5,
    DateTime = 7,
    Int64 = 10,
    Boolean = 11,
    Int8 = 16,
    UInt8 = 17,
    UInt16 = 18,
    UInt32 = 19,
    UInt64 = 22,
    String = 30,
}

impl NmsValueType {
    pub fn from_u8(value: u8) -> Option<NmsValueType> {
        let vt = match value {
            2 => NmsValueType::Int16,
            3 => NmsValueType::Int32,
            4 => NmsValueType::Real32,
            5 => NmsValueType::Real64,
            7 => NmsValueType::DateTime,
            10 => NmsValueType::Int64,
            11 => NmsValueType::Boolean,
            16 => NmsValueType::Int8,
            17 => NmsValueType::UInt8,
            18 => NmsValueType::UInt16,
            19 => NmsValueType::UInt32,
            22 => NmsValueType::UInt64,
            30 => NmsValueType::String,
            _ => return None,
        };
        Some(vt)
    }

    /// Encoded size in bytes. Strings are variable length (minimum 0).
    pub fn size(&self) -> usize {
        match self {
            NmsValueType::Unknown | NmsValueType::String => 0,
            NmsValueType::Boolean | NmsValueType::Int8 | NmsValueType::UInt8 => 1,
            NmsValueType::Int16 | NmsValueType::UInt16 => 2,
            NmsValueType::Int32 | NmsValueType::UInt32 | NmsValueType::Real32 => 4,
            NmsValueType::Int64 | NmsValueType::UInt64 | NmsValueType::Real64 => 8,
            NmsValueType::DateTime => 6,
        }
    }
}

/// A decoded NMS property value.
#[derive(Debug, Clone, PartialEq)]
pub enum NmsValue {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Real32(f32),
    Real64(f64),
    DateTime([u8; 6]),
    String(String),
    /// One slice of a domain upload: the segment offset plus its bytes.
    UploadSegment { offset: u32, data: Vec<u8> },
}

impl NmsValue {
    pub fn value_type(&self) -> NmsValueType {
        match self {
            NmsValue::Boolean(_) => NmsValueType::Boolean,
            NmsValue::Int8(_) => NmsValueType::Int8,
            NmsValue::Int16(_) => NmsValueType::Int16,
            NmsValue::Int32(_) => NmsValueType::Int32,
            NmsValue::Int64(_) => NmsValueType::Int64,
            NmsValue::UInt8(_) => NmsValueType::UInt8,
            NmsValue::UInt16(_) => NmsValueType::UInt16,
            NmsValue::UInt32(_) | NmsValue::UploadSegment { .. } => NmsValueType::UInt32,
            NmsValue::UInt64(_) => NmsValueType::UInt64,
            NmsValue::Real32(_) => NmsValueType::Real32,
            NmsValue::Real64(_) => NmsValueType::Real64,
            NmsValue::DateTime(_) => NmsValueType::DateTime,
            NmsValue::String(_) => NmsValueType::String,
        }
    }

    /// Serializes the scalar in wire byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            NmsValue::Boolean(v) => vec![u8::from(*v)],
            NmsValue::Int8(v) => v.to_le_bytes().to_vec(),
            NmsValue::Int16(v) => v.to_le_bytes().to_vec(),
            NmsValue::Int32(v) => v.to_le_bytes().to_vec(),
            NmsValue::Int64(v) => v.to_le_bytes().to_vec(),
            NmsValue::UInt8(v) => v.to_le_bytes().to_vec(),
            NmsValue::UInt16(v) => v.to_le_bytes().to_vec(),
            NmsValue::UInt32(v) => v.to_le_bytes().to_vec(),
            NmsValue::UInt64(v) => v.to_le_bytes().to_vec(),
            NmsValue::Real32(v) => v.to_le_bytes().to_vec(),
            NmsValue::Real64(v) => v.to_le_bytes().to_vec(),
            NmsValue::DateTime(v) => v.to_vec(),
            NmsValue::String(v) => {
                let mut bytes = v.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            NmsValue::UploadSegment { offset, data } => {
                let mut bytes = offset.to_le_bytes().to_vec();
                bytes.extend_from_slice(data);
                bytes
            }
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            NmsValue::UInt8(v) => Some(u32::from(*v)),
            NmsValue::UInt16(v) => Some(u32::from(*v)),
            NmsValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }
}

/// Decodes a scalar of the given type starting at `offset`.
///
/// Returns `None` when fewer than `value_type.size()` bytes remain.
pub fn decode_value(value_type: NmsValueType, buf: &[u8], offset: usize) -> Option<NmsValue> {
    let rest = buf.get(offset..)?;
    if rest.len() < value_type.size() {
        return None;
    }
    let value = match value_type {
        NmsValueType::Unknown => return None,
        NmsValueType::Boolean => NmsValue::Boolean(rest[0] != 0),
        NmsValueType::Int8 => NmsValue::Int8(rest[0] as i8),
        NmsValueType::Int16 => NmsValue::Int16(i16::from_le_bytes([rest[0], rest[1]])),
        NmsValueType::Int32 => {
            NmsValue::Int32(i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]))
        }
        NmsValueType::Int64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&rest[..8]);
            NmsValue::Int64(i64::from_le_bytes(raw))
        }
        NmsValueType::UInt8 => NmsValue::UInt8(rest[0]),
        NmsValueType::UInt16 => NmsValue::UInt16(u16::from_le_bytes([rest[0], rest[1]])),
        NmsValueType::UInt32 => {
            NmsValue::UInt32(u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]))
        }
        NmsValueType::UInt64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&rest[..8]);
            NmsValue::UInt64(u64::from_le_bytes(raw))
        }
        NmsValueType::Real32 => {
            NmsValue::Real32(f32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]))
        }
        NmsValueType::Real64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&rest[..8]);
            NmsValue::Real64(f64::from_le_bytes(raw))
        }
        NmsValueType::DateTime => {
            let mut raw = [0u8; 6];
            raw.copy_from_slice(&rest[..6]);
            NmsValue::DateTime(raw)
        }
        NmsValueType::String => {
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            NmsValue::String(String::from_utf8_lossy(&rest[..end]).into_owned())
        }
    };
    Some(value)
}
