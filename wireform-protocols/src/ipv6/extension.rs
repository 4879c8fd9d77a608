//! IPv6 extension headers
//!
//! Hop-by-hop options, destination options, routing, and fragment
//! headers form an ordered chain between the fixed IPv6 header and the
//! transport payload. Each is modeled as its own layer in the node
//! chain, carrying its own next-header field; decoding one dispatches
//! the remaining bytes through the registry with the pseudo-header
//! protocol rewritten to the chain's next value.

use std::net::Ipv6Addr;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{Error, Result};
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::ip_number::IpNumber;
use crate::node::{Header, Node};
use crate::registry::Registry;

use super::builder::{Ipv6FragmentBuilder, Ipv6OptionsBuilder, Ipv6RoutingBuilder};

/// Fragment extension header size (fixed)
pub const IPV6_FRAGMENT_HEADER_SIZE: usize = 8;

/// One option inside a hop-by-hop or destination options header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv6Option {
    /// Pad1 (type 0, one octet)
    Pad1,
    /// PadN (type 1); the value octets are kept for byte exactness
    PadN(Bytes),
    /// Any other option, kept as type plus value octets
    Other { kind: u8, data: Bytes },
}

impl Ipv6Option {
    /// The option type octet
    pub fn kind(&self) -> u8 {
        match self {
            Ipv6Option::Pad1 => 0,
            Ipv6Option::PadN(_) => 1,
            Ipv6Option::Other { kind, .. } => *kind,
        }
    }

    /// The option's size on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            Ipv6Option::Pad1 => 1,
            Ipv6Option::PadN(data) => 2 + data.len(),
            Ipv6Option::Other { data, .. } => 2 + data.len(),
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        match self {
            Ipv6Option::Pad1 => buf.put_u8(0),
            Ipv6Option::PadN(data) => {
                buf.put_u8(1);
                buf.put_u8(data.len() as u8);
                buf.put_slice(data);
            }
            Ipv6Option::Other { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8(data.len() as u8);
                buf.put_slice(data);
            }
        }
    }
}

fn parse_options(area: &[u8], layer: &'static str) -> Result<Vec<Ipv6Option>> {
    let mut options = Vec::new();
    let mut offset = 0;

    while offset < area.len() {
        let kind = area[offset];
        if kind == 0 {
            options.push(Ipv6Option::Pad1);
            offset += 1;
            continue;
        }
        let len = *area.get(offset + 1).ok_or_else(|| {
            Error::inconsistent(layer, format!("option {kind} missing length octet"))
        })? as usize;
        if offset + 2 + len > area.len() {
            return Err(Error::inconsistent(
                layer,
                format!(
                    "option {kind} length {len} exceeds {} remaining header bytes",
                    area.len() - offset - 2
                ),
            ));
        }
        let data = Bytes::copy_from_slice(&area[offset + 2..offset + 2 + len]);
        options.push(if kind == 1 {
            Ipv6Option::PadN(data)
        } else {
            Ipv6Option::Other { kind, data }
        });
        offset += 2 + len;
    }

    Ok(options)
}

fn options_wire_len(options: &[Ipv6Option]) -> usize {
    options.iter().map(|o| o.wire_len()).sum()
}

/// Hop-by-hop or destination options header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6OptionsHeader {
    /// Protocol of the next header in the chain
    pub next_header: IpNumber,
    /// The option sequence, padding options included
    pub options: Vec<Ipv6Option>,
}

impl Ipv6OptionsHeader {
    pub fn len(&self) -> usize {
        2 + options_wire_len(&self.options)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.next_header.to_u8());
        buf.put_u8((self.len() / 8).saturating_sub(1) as u8);
        for option in &self.options {
            option.write(buf);
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.len() % 8 == 0 && self.len() >= 8
    }

    /// A builder seeded from this header
    pub fn to_builder(&self) -> Ipv6OptionsBuilder {
        Ipv6OptionsBuilder::from_header(self)
    }

    fn read(data: &[u8], layer: &'static str) -> Result<(Self, usize)> {
        if data.len() < 8 {
            return Err(Error::truncated(layer, 8, data.len()));
        }
        let next_header = IpNumber::from_u8(field::read_u8(data, 0, layer)?);
        let extent = (field::read_u8(data, 1, layer)? as usize + 1) * 8;
        if data.len() < extent {
            return Err(Error::truncated(layer, extent, data.len()));
        }
        let options = parse_options(&data[2..extent], layer)?;
        Ok((
            Ipv6OptionsHeader {
                next_header,
                options,
            },
            extent,
        ))
    }
}

/// Type-specific data of a routing header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingData {
    /// Type 0 source route: 32 reserved bits and a list of addresses
    SourceRoute {
        reserved: u32,
        addresses: Vec<Ipv6Addr>,
    },
    /// Unrecognized routing type, or type-specific data that does not
    /// tile into whole addresses; kept raw
    Opaque(Bytes),
}

impl RoutingData {
    fn wire_len(&self) -> usize {
        match self {
            RoutingData::SourceRoute { addresses, .. } => 4 + addresses.len() * 16,
            RoutingData::Opaque(data) => data.len(),
        }
    }
}

/// Routing extension header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6RoutingHeader {
    /// Protocol of the next header in the chain
    pub next_header: IpNumber,
    /// Routing type
    pub routing_type: u8,
    /// Segments left
    pub segments_left: u8,
    /// Type-specific data
    pub data: RoutingData,
}

impl Ipv6RoutingHeader {
    pub fn len(&self) -> usize {
        4 + self.data.wire_len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.next_header.to_u8());
        buf.put_u8((self.len() / 8).saturating_sub(1) as u8);
        buf.put_u8(self.routing_type);
        buf.put_u8(self.segments_left);
        match &self.data {
            RoutingData::SourceRoute {
                reserved,
                addresses,
            } => {
                buf.put_u32(*reserved);
                for addr in addresses {
                    buf.put_slice(&addr.octets());
                }
            }
            RoutingData::Opaque(data) => buf.put_slice(data),
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        if self.len() % 8 != 0 || self.len() < 8 {
            return false;
        }
        match &self.data {
            RoutingData::SourceRoute { addresses, .. } => {
                self.segments_left as usize <= addresses.len()
            }
            RoutingData::Opaque(_) => true,
        }
    }

    /// A builder seeded from this header
    pub fn to_builder(&self) -> Ipv6RoutingBuilder {
        Ipv6RoutingBuilder::from_header(self)
    }

    fn read(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 8 {
            return Err(Error::truncated("IPv6 Routing", 8, data.len()));
        }
        let next_header = IpNumber::from_u8(data[0]);
        let extent = (data[1] as usize + 1) * 8;
        if data.len() < extent {
            return Err(Error::truncated("IPv6 Routing", extent, data.len()));
        }
        let routing_type = data[2];
        let segments_left = data[3];
        let type_data = &data[4..extent];

        // Lenient: a type-0 header whose data does not tile into a
        // 4-byte reserved word plus whole 16-byte addresses is kept
        // raw instead of rejected. This deviates from a strict RFC 8200
        // reading, which would treat such a header as malformed.
        let routing_data = if routing_type == 0
            && type_data.len() >= 4
            && (type_data.len() - 4) % 16 == 0
        {
            let reserved = u32::from_be_bytes([type_data[0], type_data[1], type_data[2], type_data[3]]);
            let addresses = type_data[4..]
                .chunks_exact(16)
                .map(|chunk| {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(chunk);
                    Ipv6Addr::from(octets)
                })
                .collect();
            RoutingData::SourceRoute {
                reserved,
                addresses,
            }
        } else {
            RoutingData::Opaque(Bytes::copy_from_slice(type_data))
        };

        Ok((
            Ipv6RoutingHeader {
                next_header,
                routing_type,
                segments_left,
                data: routing_data,
            },
            extent,
        ))
    }
}

/// Fragment extension header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6FragmentHeader {
    /// Protocol of the next header in the chain
    pub next_header: IpNumber,
    /// Reserved octet
    pub reserved: u8,
    /// Fragment offset in 8-byte units (13 bits)
    pub fragment_offset: u16,
    /// Reserved bits next to the offset (2 bits)
    pub reserved_flags: u8,
    /// More fragments follow
    pub more_fragments: bool,
    /// Identification shared by all fragments of one datagram
    pub identification: u32,
}

impl Ipv6FragmentHeader {
    pub fn len(&self) -> usize {
        IPV6_FRAGMENT_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(self.next_header.to_u8());
        buf.put_u8(self.reserved);
        buf.put_u16(
            ((self.fragment_offset & 0x1fff) << 3)
                | (((self.reserved_flags & 0x3) as u16) << 1)
                | (self.more_fragments as u16),
        );
        buf.put_u32(self.identification);
    }

    /// A builder seeded from this header
    pub fn to_builder(&self) -> Ipv6FragmentBuilder {
        Ipv6FragmentBuilder::from_header(self)
    }

    fn read(data: &[u8]) -> Result<Self> {
        if data.len() < IPV6_FRAGMENT_HEADER_SIZE {
            return Err(Error::truncated(
                "IPv6 Fragment",
                IPV6_FRAGMENT_HEADER_SIZE,
                data.len(),
            ));
        }
        let offset_word = field::read_u16(data, 2, "IPv6 Fragment")?;
        Ok(Ipv6FragmentHeader {
            next_header: IpNumber::from_u8(data[0]),
            reserved: data[1],
            fragment_offset: offset_word >> 3,
            reserved_flags: ((offset_word >> 1) & 0x3) as u8,
            more_fragments: offset_word & 0x1 == 1,
            identification: field::read_u32(data, 4, "IPv6 Fragment")?,
        })
    }
}

fn dispatch_rest(
    registry: &Registry,
    next_header: IpNumber,
    rest: &[u8],
    ctx: &DecodeContext,
) -> Option<Node> {
    if rest.is_empty() {
        None
    } else {
        let ctx = ctx.for_next_protocol(next_header.to_u8());
        Some(registry.decode_ip_number(next_header, rest, &ctx))
    }
}

/// Decode a hop-by-hop options header and the chain after it
pub fn decode_hop_by_hop(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    let (header, extent) = Ipv6OptionsHeader::read(data, "IPv6 Hop-by-Hop Options")?;
    let payload = dispatch_rest(registry, header.next_header, &data[extent..], ctx);
    Ok(Node::layer(
        Header::Ipv6HopByHop(header),
        payload,
        Bytes::new(),
    ))
}

/// Decode a destination options header and the chain after it
pub fn decode_dest_options(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    let (header, extent) = Ipv6OptionsHeader::read(data, "IPv6 Destination Options")?;
    let payload = dispatch_rest(registry, header.next_header, &data[extent..], ctx);
    Ok(Node::layer(
        Header::Ipv6DestOptions(header),
        payload,
        Bytes::new(),
    ))
}

/// Decode a routing header and the chain after it
pub fn decode_routing(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    let (header, extent) = Ipv6RoutingHeader::read(data)?;
    let payload = dispatch_rest(registry, header.next_header, &data[extent..], ctx);
    Ok(Node::layer(
        Header::Ipv6Routing(header),
        payload,
        Bytes::new(),
    ))
}

/// Decode a fragment header
///
/// Only the first fragment's payload starts at a protocol boundary;
/// later fragments carry mid-stream bytes and stay anonymous.
pub fn decode_fragment(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    let header = Ipv6FragmentHeader::read(data)?;
    let rest = &data[IPV6_FRAGMENT_HEADER_SIZE..];
    let payload = if rest.is_empty() {
        None
    } else if header.fragment_offset == 0 {
        dispatch_rest(registry, header.next_header, rest, ctx)
    } else {
        Some(Node::anonymous(rest.to_vec()))
    };
    Ok(Node::layer(
        Header::Ipv6Fragment(header),
        payload,
        Bytes::new(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;

    #[test]
    fn test_options_header_round_trip() {
        // next header 59, extent 8, PadN(4) filling the six option bytes
        let data = [59, 0, 1, 4, 0, 0, 0, 0];
        let (header, extent) = Ipv6OptionsHeader::read(&data, "IPv6 Hop-by-Hop Options").unwrap();
        assert_eq!(extent, 8);
        assert_eq!(header.next_header, IpNumber::NoNextHeader);
        assert_eq!(header.options, vec![Ipv6Option::PadN(Bytes::from_static(&[0; 4]))]);
        assert!(header.is_valid());

        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.as_ref(), &data);
    }

    #[test]
    fn test_option_overrun_is_inconsistent() {
        let data = [59, 0, 5, 40, 0, 0, 0, 0];
        assert!(Ipv6OptionsHeader::read(&data, "IPv6 Hop-by-Hop Options").is_err());
    }

    #[test]
    fn test_routing_type0_addresses() {
        let addr: Ipv6Addr = "2001:db8::9".parse().unwrap();
        let mut data = vec![59, 2, 0, 1, 0, 0, 0, 0];
        data.extend_from_slice(&addr.octets());
        let (header, extent) = Ipv6RoutingHeader::read(&data).unwrap();
        assert_eq!(extent, 24);
        assert_eq!(header.segments_left, 1);
        match &header.data {
            RoutingData::SourceRoute { addresses, .. } => assert_eq!(addresses, &vec![addr]),
            other => panic!("expected source route, got {other:?}"),
        }
        assert!(header.is_valid());
    }

    #[test]
    fn test_routing_type0_malformed_data_kept_raw() {
        // Extent 16 gives 12 type-data bytes: not 4 + k*16, so the
        // lenient path keeps them opaque
        let data = [59, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let (header, _) = Ipv6RoutingHeader::read(&data).unwrap();
        assert!(matches!(header.data, RoutingData::Opaque(_)));
        assert!(header.is_valid());
    }

    #[test]
    fn test_fragment_header_round_trip() {
        let header = Ipv6FragmentHeader {
            next_header: IpNumber::Udp,
            reserved: 0,
            fragment_offset: 185,
            reserved_flags: 0,
            more_fragments: true,
            identification: 0xdeadbeef,
        };
        let mut buf = BytesMut::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), 8);
        let parsed = Ipv6FragmentHeader::read(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_later_fragment_payload_stays_anonymous() {
        let mut data = vec![17, 0];
        data.extend_from_slice(&((185u16 << 3) | 1).to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0xaa; 16]);

        let node = decode_fragment(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert!(node.payload().unwrap().is_anonymous());
    }

    #[test]
    fn test_chain_dispatch_through_hop_by_hop() {
        // Hop-by-hop -> no next header, 4 payload bytes
        let mut data = vec![59, 0, 1, 4, 0, 0, 0, 0];
        data.extend_from_slice(&[9, 9, 9, 9]);
        let node = decode_hop_by_hop(default_registry(), &data, &DecodeContext::default()).unwrap();
        assert!(node.header().unwrap().as_ipv6_options().is_some());
        assert!(node.payload().unwrap().is_anonymous());
        assert_eq!(node.raw_octets().as_ref(), &data[..]);
    }
}
