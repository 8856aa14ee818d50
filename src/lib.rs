//! # nibus-rs
//!
//! `nibus-rs` is a Rust implementation of the NIBUS field-bus protocol used
//! by Nata-Info display and sensor hardware. It speaks the binary frame
//! format over a serial line, the NMS sub-protocol for reading and writing
//! device properties, and the SARP sub-protocol for bus discovery.
//!
//! ## Features
//!
//! - Frame codec with CRC16 verification and noise-tolerant stream
//!   reassembly
//! - The four NIBUS address kinds with their textual forms
//! - NMS property reads (including batch reads), writes and unsolicited
//!   information reports, with typed value decoding
//! - SARP device discovery broadcasts
//! - An async connection that correlates replies to requests with sliding
//!   timeouts and partial batch results
//! - A mock transport for testing without hardware
//!
//! ## Usage
//!
//! ```no_run
//! use nibus_rs::{connect, Address, MibDescription};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let connection = connect("/dev/ttyUSB0", MibDescription::default())?;
//!     let destination: Address = "1.2.3".parse()?;
//!     if let Some(version) = connection.get_version(destination).await {
//!         println!("device type {:04x}, firmware {}", version.device_type, version.version);
//!     }
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod error;
pub mod logging;
pub mod nibus;
pub mod nms;
pub mod sarp;

pub use error::{AddressError, NibusError};
pub use logging::{init_logger, log_debug, log_error, log_info, log_warn};
pub use nibus::serial::connect;
pub use nibus::{
    Address, Datagram, DeviceVersion, MibDescription, NibusConnection, NibusDatagram,
    NibusDecoder, NibusEvent, NmsReply, Parity,
};
pub use nms::{
    create_nms_information_report, create_nms_read, create_nms_write, NmsDatagram, NmsServiceType,
    NmsValue, NmsValueType,
};
pub use sarp::{create_sarp, SarpDatagram, SarpQueryType};
