//! 802.1Q tag layout and parsing
//!
//! A tag is four octets: the 16-bit TCI followed by the inner
//! EtherType. TCI layout:
//!
//! ```text
//! | PCP (3 bits) | CFI (1 bit) | VID (12 bits) |
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::Result;
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::ethernet::EtherType;
use crate::node::{Header, Node};
use crate::registry::Registry;

use super::builder::Dot1qBuilder;

/// Tag size in bytes: TCI plus inner EtherType
pub const DOT1Q_HEADER_SIZE: usize = 4;

/// Largest valid VLAN identifier (12 bits, 4095 reserved)
pub const DOT1Q_MAX_VLAN_ID: u16 = 4094;

const VID_MASK: u16 = 0x0fff;

/// 802.1Q tag header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dot1qHeader {
    /// Priority code point (3 bits)
    pub priority: u8,
    /// Canonical format indicator / drop eligible (1 bit)
    pub cfi: bool,
    /// VLAN identifier (12 bits)
    pub vid: u16,
    /// EtherType of the encapsulated payload
    pub ether_type: EtherType,
}

impl Dot1qHeader {
    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        let tci = field::read_u16(data, 0, "802.1Q")?;
        let ether_type = EtherType::from_u16(field::read_u16(data, 2, "802.1Q")?);
        Ok(Dot1qHeader {
            priority: (tci >> 13) as u8,
            cfi: (tci >> 12) & 0x1 == 1,
            vid: tci & VID_MASK,
            ether_type,
        })
    }

    pub fn len(&self) -> usize {
        DOT1Q_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The packed 16-bit tag control information
    pub fn tci(&self) -> u16 {
        ((self.priority as u16) << 13) | ((self.cfi as u16) << 12) | (self.vid & VID_MASK)
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tci());
        buf.put_u16(self.ether_type.to_u16());
    }

    /// A builder seeded from this header
    pub fn to_builder(&self) -> Dot1qBuilder {
        Dot1qBuilder::new()
            .with_priority(self.priority)
            .with_cfi(self.cfi)
            .with_vid(self.vid)
            .with_ether_type(self.ether_type)
    }
}

/// Decode an 802.1Q tag, dispatching the payload by the inner EtherType
pub fn decode(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    let header = Dot1qHeader::read(data)?;
    let rest = &data[DOT1Q_HEADER_SIZE..];

    let payload = if rest.is_empty() {
        None
    } else {
        Some(registry.decode_ether_type(header.ether_type, rest, ctx))
    };

    Ok(Node::layer(Header::Dot1q(header), payload, Bytes::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tci_packing() {
        let header = Dot1qHeader {
            priority: 5,
            cfi: true,
            vid: 100,
            ether_type: EtherType::Ipv4,
        };
        assert_eq!(header.tci(), (5 << 13) | (1 << 12) | 100);
        assert_eq!(header.tci(), 0xb064);
    }

    #[test]
    fn test_tci_unpacking_matches_packing() {
        let data = [0xb0, 0x64, 0x08, 0x00];
        let header = Dot1qHeader::read(&data).unwrap();
        assert_eq!(header.priority, 5);
        assert!(header.cfi);
        assert_eq!(header.vid, 100);
        assert_eq!(header.ether_type, EtherType::Ipv4);

        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.as_ref(), &data);
    }

    #[test]
    fn test_read_too_short() {
        assert!(Dot1qHeader::read(&[0xb0, 0x64, 0x08]).is_err());
    }

    #[test]
    fn test_all_tci_fields_independent() {
        // Every priority/cfi/vid combination survives a pack-unpack cycle
        for priority in 0..8u8 {
            for &cfi in &[false, true] {
                for &vid in &[0u16, 1, 100, 0x0fff] {
                    let header = Dot1qHeader {
                        priority,
                        cfi,
                        vid,
                        ether_type: EtherType::Ipv6,
                    };
                    let mut buf = BytesMut::new();
                    header.write(&mut buf);
                    let parsed = Dot1qHeader::read(&buf).unwrap();
                    assert_eq!(parsed, header);
                }
            }
        }
    }
}
