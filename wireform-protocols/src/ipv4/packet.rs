//! IPv4 packet layout and parsing

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{config, Error, Result};
use wireform_packet::{checksum, field};

use crate::context::{DecodeContext, PseudoHeader};
use crate::ip_number::IpNumber;
use crate::node::{Header, Node};
use crate::registry::Registry;

use super::builder::Ipv4Builder;
use super::options::{self, Ipv4Option};

/// Minimum IPv4 header size (IHL 5)
pub const IPV4_MIN_HEADER_SIZE: usize = 20;

/// Maximum IPv4 header size (IHL 15)
pub const IPV4_MAX_HEADER_SIZE: usize = 60;

/// IPv4 header flags (3 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ipv4Flags {
    /// Reserved bit (must be zero)
    pub reserved: bool,
    /// Don't Fragment
    pub dont_fragment: bool,
    /// More Fragments
    pub more_fragments: bool,
}

impl Ipv4Flags {
    /// No flags set
    pub const NONE: Ipv4Flags = Ipv4Flags {
        reserved: false,
        dont_fragment: false,
        more_fragments: false,
    };

    /// Don't Fragment set
    pub const DONT_FRAGMENT: Ipv4Flags = Ipv4Flags {
        reserved: false,
        dont_fragment: true,
        more_fragments: false,
    };

    /// Convert to the 3-bit wire value
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.reserved {
            flags |= 0b100;
        }
        if self.dont_fragment {
            flags |= 0b010;
        }
        if self.more_fragments {
            flags |= 0b001;
        }
        flags
    }

    /// Parse from the 3-bit wire value
    pub fn from_u8(value: u8) -> Self {
        Ipv4Flags {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }

    pub fn with_dont_fragment(mut self, df: bool) -> Self {
        self.dont_fragment = df;
        self
    }

    pub fn with_more_fragments(mut self, mf: bool) -> Self {
        self.more_fragments = mf;
        self
    }
}

/// IPv4 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Version (4)
    pub version: u8,
    /// Internet Header Length in 32-bit words
    pub ihl: u8,
    /// Type of Service / DSCP+ECN
    pub tos: u8,
    /// Total length of header plus payload, in bytes
    pub total_length: u16,
    /// Identification
    pub identification: u16,
    /// Flags
    pub flags: Ipv4Flags,
    /// Fragment offset in 8-byte units (13 bits)
    pub fragment_offset: u16,
    /// Time to Live
    pub ttl: u8,
    /// Payload protocol
    pub protocol: IpNumber,
    /// Header checksum
    pub checksum: u16,
    /// Source address
    pub src_addr: Ipv4Addr,
    /// Destination address
    pub dst_addr: Ipv4Addr,
    /// Options
    pub options: Vec<Ipv4Option>,
    /// Padding after the options, up to the IHL boundary
    pub options_padding: Bytes,
}

impl Ipv4Header {
    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        if data.len() < IPV4_MIN_HEADER_SIZE {
            return Err(Error::truncated("IPv4", IPV4_MIN_HEADER_SIZE, data.len()));
        }

        let version_ihl = field::read_u8(data, 0, "IPv4")?;
        let version = version_ihl >> 4;
        let ihl = version_ihl & 0x0f;
        if version != 4 {
            return Err(Error::inconsistent(
                "IPv4",
                format!("version field is {version}"),
            ));
        }
        if ihl < 5 {
            return Err(Error::inconsistent("IPv4", format!("IHL {ihl} below 5")));
        }
        let header_len = ihl as usize * 4;
        if data.len() < header_len {
            return Err(Error::truncated("IPv4", header_len, data.len()));
        }

        let flags_and_offset = field::read_u16(data, 6, "IPv4")?;
        let (options, options_padding) = options::parse(&data[IPV4_MIN_HEADER_SIZE..header_len])?;

        Ok(Ipv4Header {
            version,
            ihl,
            tos: field::read_u8(data, 1, "IPv4")?,
            total_length: field::read_u16(data, 2, "IPv4")?,
            identification: field::read_u16(data, 4, "IPv4")?,
            flags: Ipv4Flags::from_u8((flags_and_offset >> 13) as u8),
            fragment_offset: flags_and_offset & 0x1fff,
            ttl: field::read_u8(data, 8, "IPv4")?,
            protocol: IpNumber::from_u8(field::read_u8(data, 9, "IPv4")?),
            checksum: field::read_u16(data, 10, "IPv4")?,
            src_addr: field::read_ipv4(data, 12, "IPv4")?,
            dst_addr: field::read_ipv4(data, 16, "IPv4")?,
            options,
            options_padding,
        })
    }

    /// The header's serialized length
    pub fn len(&self) -> usize {
        IPV4_MIN_HEADER_SIZE + options::wire_len(&self.options) + self.options_padding.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// True when this header describes a fragment of a larger datagram
    pub fn is_fragmented(&self) -> bool {
        self.fragment_offset != 0 || self.flags.more_fragments
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8((self.version << 4) | (self.ihl & 0x0f));
        buf.put_u8(self.tos);
        buf.put_u16(self.total_length);
        buf.put_u16(self.identification);
        buf.put_u16(((self.flags.to_u8() as u16) << 13) | (self.fragment_offset & 0x1fff));
        buf.put_u8(self.ttl);
        buf.put_u8(self.protocol.to_u8());
        buf.put_u16(self.checksum);
        buf.put_slice(&self.src_addr.octets());
        buf.put_slice(&self.dst_addr.octets());
        for option in &self.options {
            option.write(buf);
        }
        buf.put_slice(&self.options_padding);
    }

    /// Whether the stored checksum matches the header octets
    pub fn has_valid_checksum(&self) -> bool {
        let mut buf = BytesMut::with_capacity(self.len());
        self.write(&mut buf);
        checksum::verify_checksum(&buf)
    }

    pub(crate) fn is_valid(&self, payload_len: usize) -> bool {
        if self.ihl as usize * 4 != self.len() {
            return false;
        }
        if self.total_length as usize != self.len() + payload_len {
            return false;
        }
        if config::global().verify_ipv4_checksum && !self.has_valid_checksum() {
            return false;
        }
        true
    }

    /// A builder seeded from this header's fields, verbatim
    pub fn to_builder(&self) -> Ipv4Builder {
        Ipv4Builder::from_header(self)
    }
}

/// Decode an IPv4 packet, dispatching the payload by protocol number
///
/// Octets beyond the declared total length (link-layer padding) become
/// the node's trailer. Fragment payloads stay anonymous; only an
/// unfragmented datagram's payload is dispatched to its protocol.
pub fn decode(registry: &Registry, data: &[u8], _ctx: &DecodeContext) -> Result<Node> {
    let header = Ipv4Header::read(data)?;
    let header_len = header.len();

    let total = header.total_length as usize;
    let (payload_span, trailer) = if total >= header_len && total <= data.len() {
        (&data[header_len..total], &data[total..])
    } else {
        (&data[header_len..], &[][..])
    };

    let payload = if payload_span.is_empty() {
        None
    } else if header.is_fragmented() {
        Some(Node::anonymous(payload_span.to_vec()))
    } else {
        let ctx = DecodeContext::with_pseudo(PseudoHeader::V4 {
            src: header.src_addr,
            dst: header.dst_addr,
            protocol: header.protocol.to_u8(),
        });
        Some(registry.decode_ip_number(header.protocol, payload_span, &ctx))
    };

    Ok(Node::layer(
        Header::Ipv4(header),
        payload,
        Bytes::copy_from_slice(trailer),
    ))
}
