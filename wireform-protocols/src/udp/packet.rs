//! UDP datagram layout and parsing

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{config, Error, Result};
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::node::{ChecksumStatus, Header, Node};
use crate::registry::Registry;

use super::builder::UdpBuilder;

/// UDP header size
pub const UDP_HEADER_SIZE: usize = 8;

/// A UDP port number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UdpPort(pub u16);

impl UdpPort {
    /// DNS (53)
    pub const DNS: UdpPort = UdpPort(53);
    /// DHCP server (67)
    pub const DHCP_SERVER: UdpPort = UdpPort(67);
    /// DHCP client (68)
    pub const DHCP_CLIENT: UdpPort = UdpPort(68);
    /// NTP (123)
    pub const NTP: UdpPort = UdpPort(123);

    pub fn new(port: u16) -> Self {
        UdpPort(port)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for UdpPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for UdpPort {
    fn from(port: u16) -> Self {
        UdpPort(port)
    }
}

/// UDP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    /// Source port
    pub src_port: UdpPort,
    /// Destination port
    pub dst_port: UdpPort,
    /// Length of header plus payload, in bytes
    pub length: u16,
    /// Checksum over the pseudo-header, header, and payload; zero on
    /// the wire means "no checksum"
    pub checksum: u16,
    /// Decode-time checksum verification outcome
    pub checksum_status: ChecksumStatus,
}

impl UdpHeader {
    pub fn len(&self) -> usize {
        UDP_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.src_port.to_u16());
        buf.put_u16(self.dst_port.to_u16());
        buf.put_u16(self.length);
        buf.put_u16(self.checksum);
    }

    pub(crate) fn is_valid(&self, payload_len: usize) -> bool {
        self.length as usize == UDP_HEADER_SIZE + payload_len && self.checksum_status.passes()
    }

    /// A builder seeded from this header's fields, verbatim
    pub fn to_builder(&self) -> UdpBuilder {
        UdpBuilder::from_header(self)
    }
}

/// Decode a UDP datagram
///
/// A wire checksum of exactly zero is the documented "no checksum"
/// sentinel and passes verification without recomputation. Octets
/// beyond the declared length become the node's trailer.
pub fn decode(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    if data.len() < UDP_HEADER_SIZE {
        return Err(Error::truncated("UDP", UDP_HEADER_SIZE, data.len()));
    }

    let length = field::read_u16(data, 4, "UDP")? as usize;
    if length < UDP_HEADER_SIZE {
        return Err(Error::inconsistent(
            "UDP",
            format!("length field {length} below the 8-byte header"),
        ));
    }

    let checksum = field::read_u16(data, 6, "UDP")?;
    let datagram_end = length.min(data.len());
    let checksum_status = if checksum == 0 {
        ChecksumStatus::Valid
    } else {
        match ctx.pseudo {
            Some(pseudo) if config::global().verify_udp_checksum => {
                if pseudo.verify(&data[..datagram_end]) {
                    ChecksumStatus::Valid
                } else {
                    ChecksumStatus::Invalid
                }
            }
            _ => ChecksumStatus::Unverified,
        }
    };

    let header = UdpHeader {
        src_port: UdpPort::new(field::read_u16(data, 0, "UDP")?),
        dst_port: UdpPort::new(field::read_u16(data, 2, "UDP")?),
        length: length as u16,
        checksum,
        checksum_status,
    };

    let (payload_span, trailer) = if length <= data.len() {
        (&data[UDP_HEADER_SIZE..length], &data[length..])
    } else {
        (&data[UDP_HEADER_SIZE..], &[][..])
    };

    let payload = if payload_span.is_empty() {
        None
    } else {
        Some(registry.decode_udp_ports(header.src_port, header.dst_port, payload_span, ctx))
    };

    Ok(Node::layer(
        Header::Udp(header),
        payload,
        Bytes::copy_from_slice(trailer),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PseudoHeader;
    use crate::registry::default_registry;
    use std::net::Ipv4Addr;

    fn pseudo() -> PseudoHeader {
        PseudoHeader::V4 {
            src: Ipv4Addr::new(192, 0, 2, 1),
            dst: Ipv4Addr::new(192, 0, 2, 2),
            protocol: 17,
        }
    }

    fn sample_datagram(payload: &[u8], checksum: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&5353u16.to_be_bytes());
        data.extend_from_slice(&53u16.to_be_bytes());
        data.extend_from_slice(&((UDP_HEADER_SIZE + payload.len()) as u16).to_be_bytes());
        data.extend_from_slice(&checksum.to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_decode_fixed_fields() {
        let data = sample_datagram(b"abcd", 0);
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        let header = node.header().unwrap().as_udp().unwrap();
        assert_eq!(header.src_port, UdpPort::new(5353));
        assert_eq!(header.dst_port, UdpPort::DNS);
        assert_eq!(header.length, 12);
        assert_eq!(node.payload().unwrap().len(), 4);
    }

    #[test]
    fn test_zero_checksum_is_a_valid_sentinel() {
        let data = sample_datagram(b"abcd", 0);
        let node = decode(
            default_registry(),
            &data,
            &DecodeContext::with_pseudo(pseudo()),
        )
        .unwrap();
        let header = node.header().unwrap().as_udp().unwrap();
        assert_eq!(header.checksum_status, ChecksumStatus::Valid);
        assert!(node.is_valid());
    }

    #[test]
    fn test_wrong_checksum_detected() {
        let data = sample_datagram(b"abcd", 0xbeef);
        let node = decode(
            default_registry(),
            &data,
            &DecodeContext::with_pseudo(pseudo()),
        )
        .unwrap();
        assert!(!node.is_valid());
    }

    #[test]
    fn test_correct_checksum_verifies() {
        let mut data = sample_datagram(b"abcd", 0);
        let checksum = pseudo().checksum(&data);
        data[6..8].copy_from_slice(&checksum.to_be_bytes());

        let node = decode(
            default_registry(),
            &data,
            &DecodeContext::with_pseudo(pseudo()),
        )
        .unwrap();
        let header = node.header().unwrap().as_udp().unwrap();
        assert_eq!(header.checksum_status, ChecksumStatus::Valid);
    }

    #[test]
    fn test_trailer_beyond_declared_length() {
        let mut data = sample_datagram(b"ab", 0);
        data.extend_from_slice(&[0, 0, 0]); // link padding
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert_eq!(node.trailer(), &[0, 0, 0]);
        assert_eq!(node.raw_octets().as_ref(), &data[..]);
        assert!(node.is_valid());
    }

    #[test]
    fn test_length_below_header_is_an_error() {
        let mut data = sample_datagram(b"", 0);
        data[4..6].copy_from_slice(&4u16.to_be_bytes());
        assert!(decode(default_registry(), &data, &DecodeContext::default()).is_err());
    }

    #[test]
    fn test_truncated_datagram_is_invalid_but_decodes() {
        // Declares 32 bytes, only 12 supplied
        let mut data = sample_datagram(b"abcd", 0);
        data[4..6].copy_from_slice(&32u16.to_be_bytes());
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert!(!node.is_valid());
        assert_eq!(node.len(), 12);
    }
}
