//! IPv6 and extension-header builders

use std::net::Ipv6Addr;

use bytes::Bytes;
use wireform_core::{Error, Result};

use crate::builder::Builder;
use crate::context::{BuildContext, PseudoHeader};
use crate::ip_number::IpNumber;
use crate::node::{Header, Node};

use super::extension::{
    Ipv6FragmentHeader, Ipv6Option, Ipv6OptionsHeader, Ipv6RoutingHeader, RoutingData,
};
use super::packet::{Ipv6Header, IPV6_FLOW_LABEL_MAX};

fn resolve_next_header(
    layer: &'static str,
    explicit: Option<IpNumber>,
    payload: Option<&Builder>,
) -> Result<IpNumber> {
    explicit
        .or_else(|| payload.and_then(|p| p.ip_number_hint()))
        .ok_or_else(|| Error::missing_field(layer, "next_header"))
}

/// Builder for IPv6 packets
///
/// Source and destination addresses are required; the next-header
/// number is derived from the payload builder when not set explicitly.
/// With length correction enabled (the default) the payload length is
/// measured from the built payload.
#[derive(Debug, Clone)]
pub struct Ipv6Builder {
    traffic_class: u8,
    flow_label: u32,
    payload_length: Option<u16>,
    next_header: Option<IpNumber>,
    hop_limit: u8,
    src_addr: Option<Ipv6Addr>,
    dst_addr: Option<Ipv6Addr>,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) correct_length: bool,
}

impl Ipv6Builder {
    pub fn new() -> Self {
        Ipv6Builder {
            traffic_class: 0,
            flow_label: 0,
            payload_length: None,
            next_header: None,
            hop_limit: 64,
            src_addr: None,
            dst_addr: None,
            payload: None,
            correct_length: true,
        }
    }

    /// Seed a builder from a decoded header, keeping every stored field
    pub(crate) fn from_header(header: &Ipv6Header) -> Self {
        Ipv6Builder {
            traffic_class: header.traffic_class,
            flow_label: header.flow_label,
            payload_length: Some(header.payload_length),
            next_header: Some(header.next_header),
            hop_limit: header.hop_limit,
            src_addr: Some(header.src_addr),
            dst_addr: Some(header.dst_addr),
            payload: None,
            correct_length: true,
        }
    }

    pub fn with_traffic_class(mut self, traffic_class: u8) -> Self {
        self.traffic_class = traffic_class;
        self
    }

    /// Set the flow label (20 bits)
    pub fn with_flow_label(mut self, flow_label: u32) -> Self {
        self.flow_label = flow_label;
        self
    }

    /// Store an explicit payload length, used when length correction is
    /// off
    pub fn with_payload_length(mut self, payload_length: u16) -> Self {
        self.payload_length = Some(payload_length);
        self
    }

    /// Set the next-header number explicitly instead of deriving it
    /// from the payload builder
    pub fn with_next_header(mut self, next_header: IpNumber) -> Self {
        self.next_header = Some(next_header);
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn with_src_addr(mut self, addr: Ipv6Addr) -> Self {
        self.src_addr = Some(addr);
        self
    }

    pub fn with_dst_addr(mut self, addr: Ipv6Addr) -> Self {
        self.dst_addr = Some(addr);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Derive the payload length from the built payload (default true)
    pub fn with_correct_length(mut self, correct: bool) -> Self {
        self.correct_length = correct;
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, _ctx: &BuildContext) -> Result<Node> {
        let src_addr = self
            .src_addr
            .ok_or_else(|| Error::missing_field("IPv6", "src_addr"))?;
        let dst_addr = self
            .dst_addr
            .ok_or_else(|| Error::missing_field("IPv6", "dst_addr"))?;
        let next_header =
            resolve_next_header("IPv6", self.next_header, self.payload.as_deref())?;
        if self.flow_label > IPV6_FLOW_LABEL_MAX {
            return Err(Error::field_overflow(
                "IPv6",
                "flow_label",
                format!("{} exceeds 20 bits", self.flow_label),
            ));
        }

        let ctx = BuildContext::with_pseudo(PseudoHeader::V6 {
            src: src_addr,
            dst: dst_addr,
            next_header: next_header.to_u8(),
        });
        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&ctx)?),
            None => None,
        };
        let payload_len = payload.as_ref().map_or(0, |p| p.len());
        if self.correct_length && payload_len > u16::MAX as usize {
            return Err(Error::field_overflow(
                "IPv6",
                "payload_length",
                format!("{payload_len} exceeds 16 bits"),
            ));
        }

        let payload_length = if self.correct_length {
            payload_len as u16
        } else {
            self.payload_length.unwrap_or(payload_len as u16)
        };

        Ok(Node::layer(
            Header::Ipv6(Ipv6Header {
                version: 6,
                traffic_class: self.traffic_class,
                flow_label: self.flow_label,
                payload_length,
                next_header,
                hop_limit: self.hop_limit,
                src_addr,
                dst_addr,
            }),
            payload,
            Bytes::new(),
        ))
    }
}

impl Default for Ipv6Builder {
    fn default() -> Self {
        Ipv6Builder::new()
    }
}

impl From<Ipv6Builder> for Builder {
    fn from(b: Ipv6Builder) -> Self {
        Builder::Ipv6(b)
    }
}

/// Builder for hop-by-hop and destination options headers
///
/// The option area is padded with Pad1/PadN to the 8-byte boundary the
/// wire format requires.
#[derive(Debug, Clone, Default)]
pub struct Ipv6OptionsBuilder {
    next_header: Option<IpNumber>,
    options: Vec<Ipv6Option>,
    pub(crate) payload: Option<Box<Builder>>,
}

impl Ipv6OptionsBuilder {
    pub fn new() -> Self {
        Ipv6OptionsBuilder::default()
    }

    pub(crate) fn from_header(header: &Ipv6OptionsHeader) -> Self {
        Ipv6OptionsBuilder {
            next_header: Some(header.next_header),
            options: header.options.clone(),
            payload: None,
        }
    }

    pub fn with_next_header(mut self, next_header: IpNumber) -> Self {
        self.next_header = Some(next_header);
        self
    }

    /// Append an option
    pub fn with_option(mut self, option: Ipv6Option) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    pub(crate) fn build_in(&self, ctx: &BuildContext, is_dest: bool) -> Result<Node> {
        let layer: &'static str = if is_dest {
            "IPv6 Destination Options"
        } else {
            "IPv6 Hop-by-Hop Options"
        };
        let next_header = resolve_next_header(layer, self.next_header, self.payload.as_deref())?;

        let mut options = self.options.clone();
        let unpadded = 2 + options.iter().map(|o| o.wire_len()).sum::<usize>();
        match (8 - unpadded % 8) % 8 {
            0 => {}
            1 => options.push(Ipv6Option::Pad1),
            n => options.push(Ipv6Option::PadN(Bytes::from(vec![0u8; n - 2]))),
        }

        let payload = match &self.payload {
            Some(builder) => {
                Some(builder.build_in(&ctx.for_next_protocol(next_header.to_u8()))?)
            }
            None => None,
        };

        let header = Ipv6OptionsHeader {
            next_header,
            options,
        };
        let header = if is_dest {
            Header::Ipv6DestOptions(header)
        } else {
            Header::Ipv6HopByHop(header)
        };
        Ok(Node::layer(header, payload, Bytes::new()))
    }
}

impl Ipv6OptionsBuilder {
    /// Wrap as a hop-by-hop options layer
    pub fn hop_by_hop(self) -> Builder {
        Builder::Ipv6HopByHop(self)
    }

    /// Wrap as a destination options layer
    pub fn dest_options(self) -> Builder {
        Builder::Ipv6DestOptions(self)
    }
}

/// Builder for routing extension headers
#[derive(Debug, Clone, Default)]
pub struct Ipv6RoutingBuilder {
    next_header: Option<IpNumber>,
    routing_type: u8,
    segments_left: u8,
    addresses: Vec<Ipv6Addr>,
    opaque_data: Option<Bytes>,
    pub(crate) payload: Option<Box<Builder>>,
}

impl Ipv6RoutingBuilder {
    pub fn new() -> Self {
        Ipv6RoutingBuilder::default()
    }

    pub(crate) fn from_header(header: &Ipv6RoutingHeader) -> Self {
        let mut builder = Ipv6RoutingBuilder {
            next_header: Some(header.next_header),
            routing_type: header.routing_type,
            segments_left: header.segments_left,
            addresses: Vec::new(),
            opaque_data: None,
            payload: None,
        };
        match &header.data {
            RoutingData::SourceRoute { addresses, .. } => {
                builder.addresses = addresses.clone();
            }
            RoutingData::Opaque(data) => builder.opaque_data = Some(data.clone()),
        }
        builder
    }

    pub fn with_next_header(mut self, next_header: IpNumber) -> Self {
        self.next_header = Some(next_header);
        self
    }

    pub fn with_routing_type(mut self, routing_type: u8) -> Self {
        self.routing_type = routing_type;
        self
    }

    pub fn with_segments_left(mut self, segments_left: u8) -> Self {
        self.segments_left = segments_left;
        self
    }

    /// Append a type-0 source-route address
    pub fn with_address(mut self, addr: Ipv6Addr) -> Self {
        self.addresses.push(addr);
        self
    }

    /// Store raw type-specific data instead of an address list
    pub fn with_opaque_data(mut self, data: impl Into<Bytes>) -> Self {
        self.opaque_data = Some(data.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    pub(crate) fn build_in(&self, ctx: &BuildContext) -> Result<Node> {
        let next_header =
            resolve_next_header("IPv6 Routing", self.next_header, self.payload.as_deref())?;

        let data = match &self.opaque_data {
            Some(opaque) => {
                if (4 + opaque.len()) % 8 != 0 {
                    return Err(Error::field_overflow(
                        "IPv6 Routing",
                        "opaque_data",
                        format!("{} bytes do not reach an 8-byte boundary", opaque.len()),
                    ));
                }
                RoutingData::Opaque(opaque.clone())
            }
            None => RoutingData::SourceRoute {
                reserved: 0,
                addresses: self.addresses.clone(),
            },
        };

        let payload = match &self.payload {
            Some(builder) => {
                Some(builder.build_in(&ctx.for_next_protocol(next_header.to_u8()))?)
            }
            None => None,
        };

        Ok(Node::layer(
            Header::Ipv6Routing(Ipv6RoutingHeader {
                next_header,
                routing_type: self.routing_type,
                segments_left: self.segments_left,
                data,
            }),
            payload,
            Bytes::new(),
        ))
    }
}

impl From<Ipv6RoutingBuilder> for Builder {
    fn from(b: Ipv6RoutingBuilder) -> Self {
        Builder::Ipv6Routing(b)
    }
}

/// Builder for fragment extension headers
#[derive(Debug, Clone, Default)]
pub struct Ipv6FragmentBuilder {
    next_header: Option<IpNumber>,
    fragment_offset: u16,
    more_fragments: bool,
    identification: u32,
    pub(crate) payload: Option<Box<Builder>>,
}

impl Ipv6FragmentBuilder {
    pub fn new() -> Self {
        Ipv6FragmentBuilder::default()
    }

    pub(crate) fn from_header(header: &Ipv6FragmentHeader) -> Self {
        Ipv6FragmentBuilder {
            next_header: Some(header.next_header),
            fragment_offset: header.fragment_offset,
            more_fragments: header.more_fragments,
            identification: header.identification,
            payload: None,
        }
    }

    pub fn with_next_header(mut self, next_header: IpNumber) -> Self {
        self.next_header = Some(next_header);
        self
    }

    /// Set the fragment offset in 8-byte units (13 bits)
    pub fn with_fragment_offset(mut self, offset: u16) -> Self {
        self.fragment_offset = offset;
        self
    }

    pub fn with_more_fragments(mut self, more: bool) -> Self {
        self.more_fragments = more;
        self
    }

    pub fn with_identification(mut self, identification: u32) -> Self {
        self.identification = identification;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    pub(crate) fn build_in(&self, ctx: &BuildContext) -> Result<Node> {
        let next_header =
            resolve_next_header("IPv6 Fragment", self.next_header, self.payload.as_deref())?;
        if self.fragment_offset > 0x1fff {
            return Err(Error::field_overflow(
                "IPv6 Fragment",
                "fragment_offset",
                format!("{} exceeds 13 bits", self.fragment_offset),
            ));
        }

        let payload = match &self.payload {
            Some(builder) => {
                Some(builder.build_in(&ctx.for_next_protocol(next_header.to_u8()))?)
            }
            None => None,
        };

        Ok(Node::layer(
            Header::Ipv6Fragment(Ipv6FragmentHeader {
                next_header,
                reserved: 0,
                fragment_offset: self.fragment_offset,
                reserved_flags: 0,
                more_fragments: self.more_fragments,
                identification: self.identification,
            }),
            payload,
            Bytes::new(),
        ))
    }
}

impl From<Ipv6FragmentBuilder> for Builder {
    fn from(b: Ipv6FragmentBuilder) -> Self {
        Builder::Ipv6Fragment(b)
    }
}
