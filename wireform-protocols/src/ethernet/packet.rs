//! Ethernet II frame layout and parsing

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{MacAddr, Result};
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::node::{Header, Node};
use crate::registry::Registry;

use super::builder::EthernetBuilder;

/// Ethernet header size (dst + src + type)
pub const ETHERNET_HEADER_SIZE: usize = 14;

/// Minimum Ethernet frame size without FCS; shorter frames are padded
pub const ETHERNET_MIN_FRAME_SIZE: usize = 60;

/// EtherType values used in Ethernet II frames and 802.1Q tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtherType {
    /// IPv4 (0x0800)
    Ipv4,
    /// ARP (0x0806)
    Arp,
    /// RARP (0x8035)
    Rarp,
    /// VLAN-tagged frame, 802.1Q (0x8100)
    Vlan,
    /// IPv6 (0x86DD)
    Ipv6,
    /// Q-in-Q / 802.1ad (0x88A8)
    QinQ,
    /// Any other EtherType (or an 802.3 length field, values <= 1500)
    Other(u16),
}

impl EtherType {
    /// Convert to the wire value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Rarp => 0x8035,
            EtherType::Vlan => 0x8100,
            EtherType::Ipv6 => 0x86dd,
            EtherType::QinQ => 0x88a8,
            EtherType::Other(val) => val,
        }
    }

    /// Create from the wire value
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            0x8035 => EtherType::Rarp,
            0x8100 => EtherType::Vlan,
            0x86dd => EtherType::Ipv6,
            0x88a8 => EtherType::QinQ,
            val => EtherType::Other(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Arp => write!(f, "ARP"),
            EtherType::Rarp => write!(f, "RARP"),
            EtherType::Vlan => write!(f, "802.1Q"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::QinQ => write!(f, "Q-in-Q"),
            EtherType::Other(val) => write!(f, "0x{val:04x}"),
        }
    }
}

/// Ethernet II header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination MAC address
    pub dst_addr: MacAddr,
    /// Source MAC address
    pub src_addr: MacAddr,
    /// EtherType of the payload
    pub ether_type: EtherType,
}

impl EthernetHeader {
    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        let dst_addr = field::read_mac(data, 0, "Ethernet")?;
        let src_addr = field::read_mac(data, 6, "Ethernet")?;
        let ether_type = EtherType::from_u16(field::read_u16(data, 12, "Ethernet")?);
        Ok(EthernetHeader {
            dst_addr,
            src_addr,
            ether_type,
        })
    }

    pub fn len(&self) -> usize {
        ETHERNET_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(self.dst_addr.as_bytes());
        buf.put_slice(self.src_addr.as_bytes());
        buf.put_u16(self.ether_type.to_u16());
    }

    /// A builder seeded from this header
    pub fn to_builder(&self) -> EthernetBuilder {
        EthernetBuilder::new()
            .with_dst_addr(self.dst_addr)
            .with_src_addr(self.src_addr)
            .with_ether_type(self.ether_type)
    }
}

/// Decode an Ethernet frame, dispatching the payload by EtherType
pub fn decode(registry: &Registry, data: &[u8], _ctx: &DecodeContext) -> Result<Node> {
    let header = EthernetHeader::read(data)?;
    let rest = &data[ETHERNET_HEADER_SIZE..];

    // Padding is indistinguishable from payload here; layers that carry
    // their own length (IPv4, IPv6, UDP) reclaim it as their trailer.
    let payload = if rest.is_empty() {
        None
    } else {
        Some(registry.decode_ether_type(header.ether_type, rest, &DecodeContext::default()))
    };

    Ok(Node::layer(
        Header::Ethernet(header),
        payload,
        Bytes::new(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;

    #[test]
    fn test_ether_type_conversion() {
        assert_eq!(EtherType::Ipv4.to_u16(), 0x0800);
        assert_eq!(EtherType::from_u16(0x0806), EtherType::Arp);
        assert_eq!(EtherType::from_u16(0x1234), EtherType::Other(0x1234));
        assert_eq!(EtherType::from_u16(0x88a8), EtherType::QinQ);
    }

    #[test]
    fn test_header_read() {
        let data = [
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x08, 0x00, // IPv4
        ];
        let header = EthernetHeader::read(&data).unwrap();
        assert_eq!(header.dst_addr.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(header.src_addr.octets(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(header.ether_type, EtherType::Ipv4);
    }

    #[test]
    fn test_header_too_short() {
        let data = [0u8; 13];
        assert!(EthernetHeader::read(&data).is_err());
    }

    #[test]
    fn test_decode_unknown_ether_type_payload() {
        let mut data = vec![
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x88, 0xcc,
        ];
        data.extend_from_slice(&[1, 2, 3, 4]);

        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert!(node.header().unwrap().as_ethernet().is_some());
        assert!(node.payload().unwrap().is_unknown());
        assert_eq!(node.raw_octets().as_ref(), &data[..]);
    }

    #[test]
    fn test_write_round_trip() {
        let header = EthernetHeader {
            dst_addr: MacAddr::broadcast(),
            src_addr: MacAddr::new([0, 1, 2, 3, 4, 5]),
            ether_type: EtherType::Arp,
        };
        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), ETHERNET_HEADER_SIZE);
        assert_eq!(EthernetHeader::read(&buf).unwrap(), header);
    }
}
