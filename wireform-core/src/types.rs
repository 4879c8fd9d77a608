//! Common types used throughout wireform

use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// Check if this is a multicast address (I/G bit of the first octet)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Check if this is a unicast address
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(&[':', '-'][..]).collect();
        if parts.len() != 6 {
            return Err(crate::Error::Config(format!("invalid MAC address: {s}")));
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| crate::Error::Config(format!("invalid MAC address: {s}")))?;
        }
        Ok(MacAddr(bytes))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl From<MacAddr> for [u8; 6] {
    fn from(mac: MacAddr) -> Self {
        mac.0
    }
}

/// Link-layer type declared by the capture collaborator
///
/// Carries the pcap DLT value used to select the outermost decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkLayer {
    /// Ethernet (DLT_EN10MB, 1)
    Ethernet,
    /// Raw IP, version selected by the first nibble (DLT_RAW, 101)
    RawIp,
    /// Any other DLT value
    Other(u16),
}

impl LinkLayer {
    /// Convert to the pcap DLT value
    pub fn to_u16(self) -> u16 {
        match self {
            LinkLayer::Ethernet => 1,
            LinkLayer::RawIp => 101,
            LinkLayer::Other(val) => val,
        }
    }

    /// Create from a pcap DLT value
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => LinkLayer::Ethernet,
            101 => LinkLayer::RawIp,
            val => LinkLayer::Other(val),
        }
    }
}

impl fmt::Display for LinkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkLayer::Ethernet => write!(f, "Ethernet"),
            LinkLayer::RawIp => write!(f, "Raw IP"),
            LinkLayer::Other(val) => write!(f, "DLT {val}"),
        }
    }
}
