//! Serial transport for NIBUS.
//!
//! Opens a serial port with the line parameters a MIB description asks for
//! and hands it to the connection layer. NIBUS devices run 8N1 at one of a
//! few fixed baud rates; parity varies per device category.

use log::info;
use tokio_serial::{DataBits, FlowControl, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::NibusError;
use crate::nibus::connection::NibusConnection;
use crate::nibus::description::{MibDescription, Parity};

fn serial_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

/// Opens a serial port per the description.
pub fn open(path: &str, description: &MibDescription) -> Result<SerialStream, NibusError> {
    description.validate()?;
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut stream = tokio_serial::new(path, description.baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(serial_parity(description.parity))
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| NibusError::SerialPortError(format!("{path}: {e}")))?;

    #[cfg(unix)]
    stream
        .set_exclusive(true)
        .map_err(|e| NibusError::SerialPortError(format!("{path}: {e}")))?;

    info!(
        "opened {path} at {} baud ({})",
        description.baud_rate, description.category
    );
    Ok(stream)
}

/// Opens a serial port and wraps it in a connection.
pub fn connect(path: &str, description: MibDescription) -> Result<NibusConnection, NibusError> {
    let stream = open(path, &description)?;
    NibusConnection::new(stream, description)
}
