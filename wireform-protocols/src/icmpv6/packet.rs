//! ICMPv6 message layout and parsing

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{config, Error, Result};
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::ip_number::IpNumber;
use crate::node::{ChecksumStatus, Header, Node};
use crate::registry::Registry;

use super::builder::Icmpv6Builder;

/// Minimum ICMPv6 message size: type, code, checksum, and the
/// type-specific 32-bit field
pub const ICMPV6_MIN_SIZE: usize = 8;

/// ICMPv6 message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icmpv6Type {
    /// Destination unreachable (1)
    DestinationUnreachable,
    /// Packet too big (2)
    PacketTooBig,
    /// Time exceeded (3)
    TimeExceeded,
    /// Parameter problem (4)
    ParameterProblem,
    /// Echo request (128)
    EchoRequest,
    /// Echo reply (129)
    EchoReply,
    /// Any other type
    Other(u8),
}

impl Icmpv6Type {
    pub fn to_u8(self) -> u8 {
        match self {
            Icmpv6Type::DestinationUnreachable => 1,
            Icmpv6Type::PacketTooBig => 2,
            Icmpv6Type::TimeExceeded => 3,
            Icmpv6Type::ParameterProblem => 4,
            Icmpv6Type::EchoRequest => 128,
            Icmpv6Type::EchoReply => 129,
            Icmpv6Type::Other(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Icmpv6Type::DestinationUnreachable,
            2 => Icmpv6Type::PacketTooBig,
            3 => Icmpv6Type::TimeExceeded,
            4 => Icmpv6Type::ParameterProblem,
            128 => Icmpv6Type::EchoRequest,
            129 => Icmpv6Type::EchoReply,
            val => Icmpv6Type::Other(val),
        }
    }

    /// Types below 128 are error messages embedding the invoking packet
    pub fn is_error(self) -> bool {
        self.to_u8() < 128
    }
}

impl fmt::Display for Icmpv6Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Icmpv6Type::DestinationUnreachable => write!(f, "destination unreachable"),
            Icmpv6Type::PacketTooBig => write!(f, "packet too big"),
            Icmpv6Type::TimeExceeded => write!(f, "time exceeded"),
            Icmpv6Type::ParameterProblem => write!(f, "parameter problem"),
            Icmpv6Type::EchoRequest => write!(f, "echo request"),
            Icmpv6Type::EchoReply => write!(f, "echo reply"),
            Icmpv6Type::Other(val) => write!(f, "type {val}"),
        }
    }
}

/// The type-specific 32-bit field after the common four octets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmpv6Body {
    /// Echo request/reply identifier and sequence number
    Echo { identifier: u16, sequence: u16 },
    /// MTU of the constricting link
    PacketTooBig { mtu: u32 },
    /// Offset of the problem octet in the invoking packet
    ParameterProblem { pointer: u32 },
    /// The generic unused 32-bit field
    Rest { value: u32 },
}

impl Icmpv6Body {
    /// The body's size on the wire (always four octets)
    pub fn wire_len(&self) -> usize {
        4
    }

    fn write(&self, buf: &mut BytesMut) {
        match self {
            Icmpv6Body::Echo {
                identifier,
                sequence,
            } => {
                buf.put_u16(*identifier);
                buf.put_u16(*sequence);
            }
            Icmpv6Body::PacketTooBig { mtu } => buf.put_u32(*mtu),
            Icmpv6Body::ParameterProblem { pointer } => buf.put_u32(*pointer),
            Icmpv6Body::Rest { value } => buf.put_u32(*value),
        }
    }
}

/// ICMPv6 message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icmpv6Header {
    /// Message type
    pub icmp_type: Icmpv6Type,
    /// Code qualifying the type
    pub code: u8,
    /// Checksum over the IPv6 pseudo-header and the whole message
    pub checksum: u16,
    /// Type-specific field
    pub body: Icmpv6Body,
    /// Decode-time checksum verification outcome
    pub checksum_status: ChecksumStatus,
}

impl Icmpv6Header {
    pub fn len(&self) -> usize {
        4 + self.body.wire_len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.icmp_type.to_u8());
        buf.put_u8(self.code);
        buf.put_u16(self.checksum);
        self.body.write(buf);
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.checksum_status.passes()
    }

    /// A builder seeded from this header's fields, verbatim
    pub fn to_builder(&self) -> Icmpv6Builder {
        Icmpv6Builder::from_header(self)
    }
}

fn read_body(icmp_type: Icmpv6Type, data: &[u8]) -> Result<Icmpv6Body> {
    Ok(match icmp_type {
        Icmpv6Type::EchoRequest | Icmpv6Type::EchoReply => Icmpv6Body::Echo {
            identifier: field::read_u16(data, 4, "ICMPv6")?,
            sequence: field::read_u16(data, 6, "ICMPv6")?,
        },
        Icmpv6Type::PacketTooBig => Icmpv6Body::PacketTooBig {
            mtu: field::read_u32(data, 4, "ICMPv6")?,
        },
        Icmpv6Type::ParameterProblem => Icmpv6Body::ParameterProblem {
            pointer: field::read_u32(data, 4, "ICMPv6")?,
        },
        _ => Icmpv6Body::Rest {
            value: field::read_u32(data, 4, "ICMPv6")?,
        },
    })
}

/// Decode an ICMPv6 message
///
/// The checksum covers the IPv6 pseudo-header, so verification needs
/// the enclosing IP layer's context; a message decoded without it stays
/// unverified. A zero checksum is not a sentinel here.
pub fn decode(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    if data.len() < ICMPV6_MIN_SIZE {
        return Err(Error::truncated("ICMPv6", ICMPV6_MIN_SIZE, data.len()));
    }

    let icmp_type = Icmpv6Type::from_u8(field::read_u8(data, 0, "ICMPv6")?);
    let body = read_body(icmp_type, data)?;

    let checksum_status = match ctx.pseudo {
        Some(pseudo) if config::global().verify_icmpv6_checksum => {
            if pseudo.verify(data) {
                ChecksumStatus::Valid
            } else {
                ChecksumStatus::Invalid
            }
        }
        _ => ChecksumStatus::Unverified,
    };

    let header = Icmpv6Header {
        icmp_type,
        code: field::read_u8(data, 1, "ICMPv6")?,
        checksum: field::read_u16(data, 2, "ICMPv6")?,
        body,
        checksum_status,
    };

    let rest = &data[header.len()..];
    let payload = if rest.is_empty() {
        None
    } else if icmp_type.is_error() {
        Some(registry.decode_ip_number(IpNumber::Ipv6, rest, &DecodeContext::default()))
    } else {
        Some(Node::anonymous(rest.to_vec()))
    };

    Ok(Node::layer(Header::Icmpv6(header), payload, Bytes::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PseudoHeader;
    use crate::registry::default_registry;
    use std::net::Ipv6Addr;

    fn pseudo() -> PseudoHeader {
        PseudoHeader::V6 {
            src: "2001:db8::1".parse::<Ipv6Addr>().unwrap(),
            dst: "2001:db8::2".parse::<Ipv6Addr>().unwrap(),
            next_header: 58,
        }
    }

    fn echo_message(payload: &[u8]) -> Vec<u8> {
        let mut data = vec![128, 0, 0, 0];
        data.extend_from_slice(&7u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(payload);
        let checksum = pseudo().checksum(&data);
        data[2..4].copy_from_slice(&checksum.to_be_bytes());
        data
    }

    #[test]
    fn test_decode_echo_with_pseudo_context() {
        let data = echo_message(b"ping6");
        let node = decode(
            default_registry(),
            &data,
            &DecodeContext::with_pseudo(pseudo()),
        )
        .unwrap();
        let header = node.header().unwrap().as_icmpv6().unwrap();
        assert_eq!(header.icmp_type, Icmpv6Type::EchoRequest);
        assert_eq!(header.checksum_status, ChecksumStatus::Valid);
        assert!(node.is_valid());
    }

    #[test]
    fn test_decode_without_context_stays_unverified() {
        let data = echo_message(b"ping6");
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        let header = node.header().unwrap().as_icmpv6().unwrap();
        assert_eq!(header.checksum_status, ChecksumStatus::Unverified);
        assert!(node.is_valid());
    }

    #[test]
    fn test_zero_checksum_is_not_a_sentinel() {
        let mut data = echo_message(b"ping6");
        data[2..4].copy_from_slice(&[0, 0]);
        let node = decode(
            default_registry(),
            &data,
            &DecodeContext::with_pseudo(pseudo()),
        )
        .unwrap();
        assert!(!node.is_valid());
    }

    #[test]
    fn test_packet_too_big_body() {
        let mut data = vec![2, 0, 0, 0];
        data.extend_from_slice(&1280u32.to_be_bytes());
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        let header = node.header().unwrap().as_icmpv6().unwrap();
        assert_eq!(header.body, Icmpv6Body::PacketTooBig { mtu: 1280 });
    }

    #[test]
    fn test_too_short_is_an_error() {
        assert!(decode(default_registry(), &[128, 0], &DecodeContext::default()).is_err());
    }
}
