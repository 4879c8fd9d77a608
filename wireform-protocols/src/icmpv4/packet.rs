//! ICMPv4 message layout and parsing

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{config, Error, Result};
use wireform_packet::{checksum, field};

use crate::context::DecodeContext;
use crate::ip_number::IpNumber;
use crate::node::{ChecksumStatus, Header, Node};
use crate::registry::Registry;

use super::builder::Icmpv4Builder;

/// Minimum ICMPv4 message size: type, code, checksum, and the
/// type-specific 32-bit field
pub const ICMPV4_MIN_SIZE: usize = 8;

/// ICMPv4 message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icmpv4Type {
    /// Echo reply (0)
    EchoReply,
    /// Destination unreachable (3)
    DestinationUnreachable,
    /// Source quench (4)
    SourceQuench,
    /// Redirect (5)
    Redirect,
    /// Echo request (8)
    Echo,
    /// Time exceeded (11)
    TimeExceeded,
    /// Parameter problem (12)
    ParameterProblem,
    /// Timestamp request (13)
    Timestamp,
    /// Timestamp reply (14)
    TimestampReply,
    /// Any other type
    Other(u8),
}

impl Icmpv4Type {
    pub fn to_u8(self) -> u8 {
        match self {
            Icmpv4Type::EchoReply => 0,
            Icmpv4Type::DestinationUnreachable => 3,
            Icmpv4Type::SourceQuench => 4,
            Icmpv4Type::Redirect => 5,
            Icmpv4Type::Echo => 8,
            Icmpv4Type::TimeExceeded => 11,
            Icmpv4Type::ParameterProblem => 12,
            Icmpv4Type::Timestamp => 13,
            Icmpv4Type::TimestampReply => 14,
            Icmpv4Type::Other(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Icmpv4Type::EchoReply,
            3 => Icmpv4Type::DestinationUnreachable,
            4 => Icmpv4Type::SourceQuench,
            5 => Icmpv4Type::Redirect,
            8 => Icmpv4Type::Echo,
            11 => Icmpv4Type::TimeExceeded,
            12 => Icmpv4Type::ParameterProblem,
            13 => Icmpv4Type::Timestamp,
            14 => Icmpv4Type::TimestampReply,
            val => Icmpv4Type::Other(val),
        }
    }

    /// Error messages embed a truncated copy of the invoking packet
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Icmpv4Type::DestinationUnreachable
                | Icmpv4Type::SourceQuench
                | Icmpv4Type::Redirect
                | Icmpv4Type::TimeExceeded
                | Icmpv4Type::ParameterProblem
        )
    }
}

impl fmt::Display for Icmpv4Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Icmpv4Type::EchoReply => write!(f, "echo reply"),
            Icmpv4Type::DestinationUnreachable => write!(f, "destination unreachable"),
            Icmpv4Type::SourceQuench => write!(f, "source quench"),
            Icmpv4Type::Redirect => write!(f, "redirect"),
            Icmpv4Type::Echo => write!(f, "echo request"),
            Icmpv4Type::TimeExceeded => write!(f, "time exceeded"),
            Icmpv4Type::ParameterProblem => write!(f, "parameter problem"),
            Icmpv4Type::Timestamp => write!(f, "timestamp request"),
            Icmpv4Type::TimestampReply => write!(f, "timestamp reply"),
            Icmpv4Type::Other(val) => write!(f, "type {val}"),
        }
    }
}

/// The type-specific field(s) after the common four octets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmpv4Body {
    /// Echo request/reply identifier and sequence number
    Echo { identifier: u16, sequence: u16 },
    /// Redirect gateway address
    Redirect { gateway: Ipv4Addr },
    /// Parameter problem pointer plus unused octets
    ParameterProblem { pointer: u8, unused: [u8; 3] },
    /// Timestamp request/reply
    Timestamp {
        identifier: u16,
        sequence: u16,
        originate: u32,
        receive: u32,
        transmit: u32,
    },
    /// The generic 32-bit rest-of-header field (unused for destination
    /// unreachable, time exceeded, source quench)
    Rest { value: u32 },
}

impl Icmpv4Body {
    /// The body's size on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            Icmpv4Body::Timestamp { .. } => 16,
            _ => 4,
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        match self {
            Icmpv4Body::Echo {
                identifier,
                sequence,
            } => {
                buf.put_u16(*identifier);
                buf.put_u16(*sequence);
            }
            Icmpv4Body::Redirect { gateway } => buf.put_slice(&gateway.octets()),
            Icmpv4Body::ParameterProblem { pointer, unused } => {
                buf.put_u8(*pointer);
                buf.put_slice(unused);
            }
            Icmpv4Body::Timestamp {
                identifier,
                sequence,
                originate,
                receive,
                transmit,
            } => {
                buf.put_u16(*identifier);
                buf.put_u16(*sequence);
                buf.put_u32(*originate);
                buf.put_u32(*receive);
                buf.put_u32(*transmit);
            }
            Icmpv4Body::Rest { value } => buf.put_u32(*value),
        }
    }
}

/// ICMPv4 message header: the common octets plus the type-specific body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icmpv4Header {
    /// Message type
    pub icmp_type: Icmpv4Type,
    /// Code qualifying the type
    pub code: u8,
    /// Checksum over the whole ICMP message
    pub checksum: u16,
    /// Type-specific field(s)
    pub body: Icmpv4Body,
    /// Decode-time checksum verification outcome
    pub checksum_status: ChecksumStatus,
}

impl Icmpv4Header {
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
    pub fn to_builder(&self) -> Icmpv4Builder {
        Icmpv4Builder::from_header(self)
    }
}

fn read_body(icmp_type: Icmpv4Type, data: &[u8]) -> Result<Icmpv4Body> {
    Ok(match icmp_type {
        Icmpv4Type::Echo | Icmpv4Type::EchoReply => Icmpv4Body::Echo {
            identifier: field::read_u16(data, 4, "ICMPv4")?,
            sequence: field::read_u16(data, 6, "ICMPv4")?,
        },
        Icmpv4Type::Redirect => Icmpv4Body::Redirect {
            gateway: field::read_ipv4(data, 4, "ICMPv4")?,
        },
        Icmpv4Type::ParameterProblem => Icmpv4Body::ParameterProblem {
            pointer: field::read_u8(data, 4, "ICMPv4")?,
            unused: [data[5], data[6], data[7]],
        },
        Icmpv4Type::Timestamp | Icmpv4Type::TimestampReply => Icmpv4Body::Timestamp {
            identifier: field::read_u16(data, 4, "ICMPv4")?,
            sequence: field::read_u16(data, 6, "ICMPv4")?,
            originate: field::read_u32(data, 8, "ICMPv4")?,
            receive: field::read_u32(data, 12, "ICMPv4")?,
            transmit: field::read_u32(data, 16, "ICMPv4")?,
        },
        _ => Icmpv4Body::Rest {
            value: field::read_u32(data, 4, "ICMPv4")?,
        },
    })
}

/// Decode an ICMPv4 message
///
/// The checksum covers the whole message; a zero checksum is not a
/// sentinel here, unlike UDP. Error messages carry the truncated
/// invoking packet as an embedded IPv4 payload.
pub fn decode(registry: &Registry, data: &[u8], _ctx: &DecodeContext) -> Result<Node> {
    if data.len() < ICMPV4_MIN_SIZE {
        return Err(Error::truncated("ICMPv4", ICMPV4_MIN_SIZE, data.len()));
    }

    let icmp_type = Icmpv4Type::from_u8(field::read_u8(data, 0, "ICMPv4")?);
    let body = read_body(icmp_type, data)?;

    let checksum_status = if config::global().verify_icmpv4_checksum {
        if checksum::verify_checksum(data) {
            ChecksumStatus::Valid
        } else {
            ChecksumStatus::Invalid
        }
    } else {
        ChecksumStatus::Unverified
    };

    let header = Icmpv4Header {
        icmp_type,
        code: field::read_u8(data, 1, "ICMPv4")?,
        checksum: field::read_u16(data, 2, "ICMPv4")?,
        body,
        checksum_status,
    };

    let rest = &data[header.len()..];
    let payload = if rest.is_empty() {
        None
    } else if icmp_type.is_error() {
        // The embedded invoking packet; its own truncation shows up as
        // illegal/invalid inner layers without failing this message
        Some(registry.decode_ip_number(IpNumber::Ipv4, rest, &DecodeContext::default()))
    } else {
        Some(Node::anonymous(rest.to_vec()))
    };

    Ok(Node::layer(Header::Icmpv4(header), payload, Bytes::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;
    use wireform_packet::internet_checksum;

    fn echo_message(payload: &[u8]) -> Vec<u8> {
        let mut data = vec![8, 0, 0, 0];
        data.extend_from_slice(&0x1234u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(payload);
        let checksum = internet_checksum(&data);
        data[2..4].copy_from_slice(&checksum.to_be_bytes());
        data
    }

    #[test]
    fn test_decode_echo() {
        let data = echo_message(b"ping");
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        let header = node.header().unwrap().as_icmpv4().unwrap();
        assert_eq!(header.icmp_type, Icmpv4Type::Echo);
        assert_eq!(
            header.body,
            Icmpv4Body::Echo {
                identifier: 0x1234,
                sequence: 1
            }
        );
        assert_eq!(header.checksum_status, ChecksumStatus::Valid);
        assert!(node.payload().unwrap().is_anonymous());
        assert!(node.is_valid());
    }

    #[test]
    fn test_corrupted_checksum_detected() {
        let mut data = echo_message(b"ping");
        data[9] ^= 0x01;
        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert!(!node.is_valid());
    }

    #[test]
    fn test_too_short_is_an_error() {
        assert_eq!(
            decode(default_registry(), &[8, 0, 0], &DecodeContext::default()).unwrap_err(),
            Error::truncated("ICMPv4", 8, 3)
        );
    }

    #[test]
    fn test_timestamp_needs_twenty_bytes() {
        let data = [13, 0, 0, 0, 0, 1, 0, 2];
        assert!(decode(default_registry(), &data, &DecodeContext::default()).is_err());
    }

    #[test]
    fn test_error_message_embeds_invoking_packet() {
        // Destination unreachable around a minimal IPv4 header
        let mut embedded =
            hex_literal::hex!("4500 001c 0001 0000 40ff 0000 c000 0201 c000 0202").to_vec();
        let ip_checksum = internet_checksum(&embedded);
        embedded[10..12].copy_from_slice(&ip_checksum.to_be_bytes());
        embedded.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let mut data = vec![3, 1, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&embedded);
        let checksum = internet_checksum(&data);
        data[2..4].copy_from_slice(&checksum.to_be_bytes());

        let node = decode(default_registry(), &data, &DecodeContext::default()).unwrap();
        let header = node.header().unwrap().as_icmpv4().unwrap();
        assert!(header.icmp_type.is_error());
        let inner = node.payload().unwrap();
        assert!(inner.header().unwrap().as_ipv4().is_some());
        assert_eq!(node.raw_octets().as_ref(), &data[..]);
    }
}
