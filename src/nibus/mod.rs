//! Core NIBUS layer: addressing, frame codec, stream reassembly and the
//! connection that multiplexes requests over one transport.

pub mod address;
pub mod connection;
pub mod decoder;
pub mod description;
pub mod frame;
pub mod serial;
pub mod serial_mock;

pub use address::Address;
pub use connection::{Datagram, DeviceVersion, NibusConnection, NibusEvent, NmsReply};
pub use decoder::NibusDecoder;
pub use description::{MibDescription, Parity};
pub use frame::NibusDatagram;
