//! IPv6 fixed header layout and parsing

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{Error, Result};
use wireform_packet::field;

use crate::context::{DecodeContext, PseudoHeader};
use crate::ip_number::IpNumber;
use crate::node::{Header, Node};
use crate::registry::Registry;

use super::builder::Ipv6Builder;

/// Fixed IPv6 header size
pub const IPV6_HEADER_SIZE: usize = 40;

/// Largest flow label (20 bits)
pub const IPV6_FLOW_LABEL_MAX: u32 = 0x000f_ffff;

/// IPv6 fixed header
///
/// There is no header checksum; upper layers cover a pseudo-header
/// instead. Extension headers are separate layers in the node chain,
/// each carrying its own next-header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Header {
    /// Version (6)
    pub version: u8,
    /// Traffic class
    pub traffic_class: u8,
    /// Flow label (20 bits)
    pub flow_label: u32,
    /// Length of everything after this header, in bytes
    pub payload_length: u16,
    /// Protocol of the next header or payload
    pub next_header: IpNumber,
    /// Hop limit
    pub hop_limit: u8,
    /// Source address
    pub src_addr: Ipv6Addr,
    /// Destination address
    pub dst_addr: Ipv6Addr,
}

impl Ipv6Header {
    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        if data.len() < IPV6_HEADER_SIZE {
            return Err(Error::truncated("IPv6", IPV6_HEADER_SIZE, data.len()));
        }
        let first_word = field::read_u32(data, 0, "IPv6")?;
        let version = (first_word >> 28) as u8;
        if version != 6 {
            return Err(Error::inconsistent(
                "IPv6",
                format!("version field is {version}"),
            ));
        }
        Ok(Ipv6Header {
            version,
            traffic_class: ((first_word >> 20) & 0xff) as u8,
            flow_label: first_word & IPV6_FLOW_LABEL_MAX,
            payload_length: field::read_u16(data, 4, "IPv6")?,
            next_header: IpNumber::from_u8(field::read_u8(data, 6, "IPv6")?),
            hop_limit: field::read_u8(data, 7, "IPv6")?,
            src_addr: field::read_ipv6(data, 8, "IPv6")?,
            dst_addr: field::read_ipv6(data, 24, "IPv6")?,
        })
    }

    pub fn len(&self) -> usize {
        IPV6_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        let first_word = ((self.version as u32) << 28)
            | ((self.traffic_class as u32) << 20)
            | (self.flow_label & IPV6_FLOW_LABEL_MAX);
        buf.put_u32(first_word);
        buf.put_u16(self.payload_length);
        buf.put_u8(self.next_header.to_u8());
        buf.put_u8(self.hop_limit);
        buf.put_slice(&self.src_addr.octets());
        buf.put_slice(&self.dst_addr.octets());
    }

    pub(crate) fn is_valid(&self, payload_len: usize) -> bool {
        self.payload_length as usize == payload_len
    }

    /// A builder seeded from this header's fields, verbatim
    pub fn to_builder(&self) -> Ipv6Builder {
        Ipv6Builder::from_header(self)
    }
}

/// Decode an IPv6 packet, dispatching by the next-header number
///
/// Octets beyond the declared payload length (link-layer padding)
/// become the node's trailer.
pub fn decode(registry: &Registry, data: &[u8], _ctx: &DecodeContext) -> Result<Node> {
    let header = Ipv6Header::read(data)?;

    let end = IPV6_HEADER_SIZE + header.payload_length as usize;
    let (payload_span, trailer) = if end <= data.len() {
        (&data[IPV6_HEADER_SIZE..end], &data[end..])
    } else {
        (&data[IPV6_HEADER_SIZE..], &[][..])
    };

    let payload = if payload_span.is_empty() {
        None
    } else {
        let ctx = DecodeContext::with_pseudo(PseudoHeader::V6 {
            src: header.src_addr,
            dst: header.dst_addr,
            next_header: header.next_header.to_u8(),
        });
        Some(registry.decode_ip_number(header.next_header, payload_span, &ctx))
    };

    Ok(Node::layer(
        Header::Ipv6(header),
        payload,
        Bytes::copy_from_slice(trailer),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;

    fn sample_header() -> Vec<u8> {
        let mut data = Vec::new();
        // version 6, traffic class 0x0a, flow label 0x12345
        data.extend_from_slice(&0x60a1_2345u32.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes()); // payload length
        data.push(59); // no next header
        data.push(64); // hop limit
        data.extend_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
        data.extend_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());
        data
    }

    #[test]
    fn test_read_packed_first_word() {
        let header = Ipv6Header::read(&sample_header()).unwrap();
        assert_eq!(header.version, 6);
        assert_eq!(header.traffic_class, 0x0a);
        assert_eq!(header.flow_label, 0x12345);
        assert_eq!(header.payload_length, 4);
        assert_eq!(header.next_header, IpNumber::NoNextHeader);
        assert_eq!(header.hop_limit, 64);
    }

    #[test]
    fn test_write_round_trip() {
        let header = Ipv6Header::read(&sample_header()).unwrap();
        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.as_ref(), &sample_header()[..]);
    }

    #[test]
    fn test_truncated_is_an_error() {
        let data = sample_header();
        assert_eq!(
            Ipv6Header::read(&data[..39]).unwrap_err(),
            Error::truncated("IPv6", 40, 39)
        );
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut data = sample_header();
        data[0] = 0x40;
        assert!(matches!(
            Ipv6Header::read(&data).unwrap_err(),
            Error::Inconsistent { layer: "IPv6", .. }
        ));
    }

    #[test]
    fn test_decode_no_next_header_payload_is_anonymous() {
        let mut data = sample_header();
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend_from_slice(&[0, 0]); // link padding

        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert!(node.payload().unwrap().is_anonymous());
        assert_eq!(node.payload().unwrap().len(), 4);
        assert_eq!(node.trailer(), &[0, 0]);
        assert!(node.is_valid());
        assert_eq!(node.raw_octets().as_ref(), &data[..]);
    }
}
