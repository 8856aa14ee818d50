//! NIBUS addressing.
//!
//! A NIBUS address always occupies exactly [`ADDRESS_LENGTH`] bytes on the
//! wire; the address *kind* travels out-of-band as a 2-bit field in the
//! frame's service byte. Four kinds exist: the empty (undirected) address,
//! a raw 5-byte hardware MAC, a hierarchical `domain.subnet.device` logical
//! address, and a multicast-style group pattern.

use std::fmt;
use std::str::FromStr;

use crate::constants::ADDRESS_LENGTH;
use crate::error::AddressError;

/// 2-bit address kind codes carried in the frame service byte.
pub const RAW_TYPE_EMPTY: u8 = 0;
pub const RAW_TYPE_MAC: u8 = 1;
pub const RAW_TYPE_NET: u8 = 2;
pub const RAW_TYPE_GROUP: u8 = 3;

/// A NIBUS device address.
///
/// Equality is value equality within a kind; a `Net` address and the `Mac`
/// address it currently resolves to are never equal. Resolution between the
/// two is the business of layers above this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// No destination / undirected. Used as the source of host-originated
    /// requests and as the destination of broadcast-correlated replies.
    Empty,
    /// Raw hardware address.
    Mac([u8; ADDRESS_LENGTH]),
    /// Hierarchical logical address. Domain 255 is reserved as "any domain"
    /// by some MIBs; this crate passes it through untouched.
    Net { domain: u8, subnet: u8, device: u8 },
    /// Multicast-style group match pattern.
    Group([u8; ADDRESS_LENGTH]),
}

impl Address {
    /// The all-ones MAC used as the SARP broadcast destination.
    pub fn broadcast() -> Address {
        Address::Mac([0xFF; ADDRESS_LENGTH])
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Address::Empty)
    }

    /// The 2-bit kind code for the frame service byte.
    pub fn raw_type(&self) -> u8 {
        match self {
            Address::Empty => RAW_TYPE_EMPTY,
            Address::Mac(_) => RAW_TYPE_MAC,
            Address::Net { .. } => RAW_TYPE_NET,
            Address::Group(_) => RAW_TYPE_GROUP,
        }
    }

    /// Packs the address into its fixed 5-byte wire representation.
    ///
    /// `Net` occupies the low three bytes; unused leading bytes are zero.
    pub fn to_wire(&self) -> [u8; ADDRESS_LENGTH] {
        match self {
            Address::Empty => [0; ADDRESS_LENGTH],
            Address::Mac(raw) | Address::Group(raw) => *raw,
            Address::Net {
                domain,
                subnet,
                device,
            } => [0, 0, *domain, *subnet, *device],
        }
    }

    /// Reconstructs an address from its kind code and 5 wire bytes.
    ///
    /// Unknown kind codes cannot occur: the source field is 2 bits wide.
    pub fn from_wire(raw_type: u8, raw: &[u8; ADDRESS_LENGTH]) -> Address {
        match raw_type & 3 {
            RAW_TYPE_MAC => Address::Mac(*raw),
            RAW_TYPE_NET => Address::Net {
                domain: raw[2],
                subnet: raw[3],
                device: raw[4],
            },
            RAW_TYPE_GROUP => Address::Group(*raw),
            _ => Address::Empty,
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::Empty
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Empty => write!(f, "auto"),
            Address::Mac(raw) => write!(f, "{}", colon_hex(raw)),
            Address::Net {
                domain,
                subnet,
                device,
            } => write!(f, "{domain}.{subnet}.{device}"),
            Address::Group(raw) => write!(f, "#{}", colon_hex(raw)),
        }
    }
}

fn colon_hex(raw: &[u8; ADDRESS_LENGTH]) -> String {
    raw.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn parse_colon_hex(s: &str) -> Result<[u8; ADDRESS_LENGTH], AddressError> {
    let octets: Vec<&str> = s.split(':').collect();
    if octets.len() != ADDRESS_LENGTH {
        return Err(AddressError::WrongLength {
            expected: ADDRESS_LENGTH,
            actual: octets.len(),
        });
    }
    let mut raw = [0u8; ADDRESS_LENGTH];
    for (dst, octet) in raw.iter_mut().zip(octets) {
        *dst = u8::from_str_radix(octet, 16)
            .map_err(|_| AddressError::InvalidOctet(octet.to_string()))?;
    }
    Ok(raw)
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parses the canonical textual forms: `auto` (empty), `broadcast`,
    /// colon-hex MAC (`00:1e:38:aa:01`), dotted net (`1.2.3`) and
    /// `#`-prefixed colon-hex group patterns.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" | "auto" | "empty" => return Ok(Address::Empty),
            "broadcast" => return Ok(Address::broadcast()),
            _ => {}
        }
        if let Some(group) = s.strip_prefix('#') {
            return Ok(Address::Group(parse_colon_hex(group)?));
        }
        if s.contains(':') {
            return Ok(Address::Mac(parse_colon_hex(s)?));
        }
        if s.contains('.') {
            let parts: Vec<&str> = s.split('.').collect();
            if parts.len() != 3 {
                return Err(AddressError::Invalid(s.to_string()));
            }
            let mut nums = [0u8; 3];
            for (dst, part) in nums.iter_mut().zip(&parts) {
                *dst = part
                    .parse()
                    .map_err(|_| AddressError::InvalidOctet(part.to_string()))?;
            }
            return Ok(Address::Net {
                domain: nums[0],
                subnet: nums[1],
                device: nums[2],
            });
        }
        Err(AddressError::Invalid(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forms() {
        assert_eq!("auto".parse::<Address>().unwrap(), Address::Empty);
        assert_eq!("".parse::<Address>().unwrap(), Address::Empty);
        assert_eq!(
            "1.2.3".parse::<Address>().unwrap(),
            Address::Net {
                domain: 1,
                subnet: 2,
                device: 3
            }
        );
        assert_eq!(
            "00:1e:38:aa:01".parse::<Address>().unwrap(),
            Address::Mac([0x00, 0x1E, 0x38, 0xAA, 0x01])
        );
        assert_eq!(
            "#ff:00:00:ab:c6".parse::<Address>().unwrap(),
            Address::Group([0xFF, 0x00, 0x00, 0xAB, 0xC6])
        );
        assert_eq!("broadcast".parse::<Address>().unwrap(), Address::broadcast());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("1.2".parse::<Address>().is_err());
        assert!("zz:00:00:00:00".parse::<Address>().is_err());
        assert!("1.2.3.4".parse::<Address>().is_err());
        assert!("minihost".parse::<Address>().is_err());
    }

    #[test]
    fn net_and_mac_with_same_bytes_differ() {
        let net = Address::Net {
            domain: 1,
            subnet: 2,
            device: 3,
        };
        let mac = Address::Mac(net.to_wire());
        assert_ne!(net, mac);
    }

    #[test]
    fn wire_round_trip() {
        let addresses = [
            Address::Empty,
            Address::broadcast(),
            Address::Mac([0x00, 0x1E, 0x38, 0xAA, 0x01]),
            Address::Net {
                domain: 1,
                subnet: 2,
                device: 3,
            },
            Address::Group([0xFF, 0x00, 0x00, 0xAB, 0xC6]),
        ];
        for addr in addresses {
            let recovered = Address::from_wire(addr.raw_type(), &addr.to_wire());
            assert_eq!(recovered, addr);
        }
    }

    #[test]
    fn display_round_trip() {
        for s in ["auto", "1.2.3", "00:1e:38:aa:01", "#ff:00:00:ab:c6"] {
            let addr: Address = s.parse().unwrap();
            assert_eq!(addr.to_string(), s);
        }
    }
}
