//! # NIBUS Error Handling
//!
//! This module defines the NibusError enum, which represents the different
//! error types that can occur in the nibus-rs crate, and the AddressError
//! type produced when parsing address strings.

use thiserror::Error;

use crate::nibus::address::Address;
use crate::nms::service::NmsServiceType;

/// Represents the different error types that can occur in the NIBUS crate.
#[derive(Debug, Error)]
pub enum NibusError {
    /// No reply arrived within the sliding deadline and nothing was collected.
    #[error("timeout on {destination} while {service:?}")]
    Timeout {
        destination: Address,
        service: NmsServiceType,
    },

    /// The connection was closed while a request was pending, or a send was
    /// attempted after close.
    #[error("connection closed")]
    Closed,

    /// The MIB description handed to the connection constructor is malformed.
    #[error("invalid MIB description: {0}")]
    InvalidDescription(String),

    /// Payload exceeds what the one-byte length field can carry.
    #[error("datagram payload too long: {0} bytes")]
    DataTooLong(usize),

    /// Too many property ids packed into a single batch read.
    #[error("too many properties in batch read: {0} (max 21)")]
    TooManyProperties(usize),

    /// Indicates an error related to the serial port or socket transport.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// Indicates an invalid address string or wire representation.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Indicates an error when opening the serial port.
    #[error("serial port error: {0}")]
    SerialPortError(String),
}

/// Errors produced when parsing the textual address forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address: {0}")]
    Invalid(String),

    #[error("invalid MAC octet: {0}")]
    InvalidOctet(String),

    #[error("address has wrong length: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}
