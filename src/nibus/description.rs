//! MIB description of a bus segment.
//!
//! A description names the device category a serial port speaks to and the
//! line parameters the port must be opened with. Descriptions normally come
//! from MIB files; here they are plain values validated before use.

use crate::error::NibusError;

/// Baud rates NIBUS hardware is known to run at.
pub const KNOWN_BAUD_RATES: [u32; 4] = [9600, 38400, 57600, 115200];

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Line parameters and category of one bus segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MibDescription {
    /// Device category, e.g. `siolynx` or `minihost`. Never empty.
    pub category: String,
    pub baud_rate: u32,
    pub parity: Parity,
    /// Whether the segment is a link (router) rather than a leaf device.
    pub link: bool,
}

impl Default for MibDescription {
    fn default() -> Self {
        MibDescription {
            category: "nibus".to_string(),
            baud_rate: 115200,
            parity: Parity::None,
            link: false,
        }
    }
}

impl MibDescription {
    /// Checks the description before a port is opened with it.
    pub fn validate(&self) -> Result<(), NibusError> {
        if self.category.trim().is_empty() {
            return Err(NibusError::InvalidDescription(
                "empty device category".to_string(),
            ));
        }
        if !KNOWN_BAUD_RATES.contains(&self.baud_rate) {
            return Err(NibusError::InvalidDescription(format!(
                "unsupported baud rate {}",
                self.baud_rate
            )));
        }
        Ok(())
    }
}
