//! Protocol factory registry
//!
//! A two-level lookup from (identifier type, wire value) to a decoder.
//! Decoding through the registry never fails: an identifier with no
//! registered decoder yields an unknown or anonymous leaf, and a
//! decoder that rejects its input yields an illegal leaf preserving the
//! offending bytes, so one corrupt inner layer never discards an
//! otherwise well-formed outer capture.
//!
//! The registry is configured once before any decode activity and
//! read-only afterwards; lookups need no locking.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::warn;
use wireform_core::{LinkLayer, Result};

use crate::context::DecodeContext;
use crate::ethernet::EtherType;
use crate::ip_number::IpNumber;
use crate::node::Node;
use crate::tcp::TcpPort;
use crate::udp::UdpPort;
use crate::{arp, dot1q, ethernet, icmpv4, icmpv6, ipv4, ipv6, tcp, udp};

/// A decoder entry: parses one layer and recurses through the registry
/// for its payload
pub type DecodeFn = fn(&Registry, &[u8], &DecodeContext) -> Result<Node>;

/// Dispatch tables keyed by identifier type and wire value
#[derive(Clone, Default)]
pub struct Registry {
    link_layers: HashMap<u16, DecodeFn>,
    ether_types: HashMap<u16, DecodeFn>,
    ip_numbers: HashMap<u8, DecodeFn>,
    tcp_ports: HashMap<u16, DecodeFn>,
    udp_ports: HashMap<u16, DecodeFn>,
}

impl Registry {
    /// An empty registry; register decoders before use
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register the outermost decoder for a link-layer type
    pub fn register_link_layer(&mut self, link: LinkLayer, decoder: DecodeFn) -> &mut Self {
        self.link_layers.insert(link.to_u16(), decoder);
        self
    }

    /// Register a decoder for an EtherType value
    ///
    /// The same entry serves every layer that dispatches on EtherTypes
    /// (Ethernet and 802.1Q tags).
    pub fn register_ether_type(&mut self, ether_type: EtherType, decoder: DecodeFn) -> &mut Self {
        self.ether_types.insert(ether_type.to_u16(), decoder);
        self
    }

    /// Register a decoder for an IP protocol / next-header number
    pub fn register_ip_number(&mut self, protocol: IpNumber, decoder: DecodeFn) -> &mut Self {
        self.ip_numbers.insert(protocol.to_u8(), decoder);
        self
    }

    /// Register a decoder for a TCP destination or source port
    pub fn register_tcp_port(&mut self, port: TcpPort, decoder: DecodeFn) -> &mut Self {
        self.tcp_ports.insert(port.to_u16(), decoder);
        self
    }

    /// Register a decoder for a UDP destination or source port
    pub fn register_udp_port(&mut self, port: UdpPort, decoder: DecodeFn) -> &mut Self {
        self.udp_ports.insert(port.to_u16(), decoder);
        self
    }

    /// Decode a whole capture given its declared link-layer type
    pub fn decode_link(&self, link: LinkLayer, data: &[u8]) -> Node {
        match self.link_layers.get(&link.to_u16()) {
            Some(decoder) => run(*decoder, self, data, &DecodeContext::default()),
            None => Node::unknown(data.to_vec()),
        }
    }

    /// Decode a payload identified by an EtherType
    pub fn decode_ether_type(
        &self,
        ether_type: EtherType,
        data: &[u8],
        ctx: &DecodeContext,
    ) -> Node {
        match self.ether_types.get(&ether_type.to_u16()) {
            Some(decoder) => run(*decoder, self, data, ctx),
            None => Node::unknown(data.to_vec()),
        }
    }

    /// Decode a payload identified by an IP protocol number
    pub fn decode_ip_number(&self, protocol: IpNumber, data: &[u8], ctx: &DecodeContext) -> Node {
        match self.ip_numbers.get(&protocol.to_u8()) {
            Some(decoder) => run(*decoder, self, data, ctx),
            None => Node::unknown(data.to_vec()),
        }
    }

    /// Decode application bytes identified by a TCP port pair
    ///
    /// Tries the destination port, then the source port; with no entry
    /// the bytes stay an anonymous leaf.
    pub fn decode_tcp_ports(
        &self,
        src: TcpPort,
        dst: TcpPort,
        data: &[u8],
        ctx: &DecodeContext,
    ) -> Node {
        let decoder = self
            .tcp_ports
            .get(&dst.to_u16())
            .or_else(|| self.tcp_ports.get(&src.to_u16()));
        match decoder {
            Some(decoder) => run(*decoder, self, data, ctx),
            None => Node::anonymous(data.to_vec()),
        }
    }

    /// Decode application bytes identified by a UDP port pair
    pub fn decode_udp_ports(
        &self,
        src: UdpPort,
        dst: UdpPort,
        data: &[u8],
        ctx: &DecodeContext,
    ) -> Node {
        let decoder = self
            .udp_ports
            .get(&dst.to_u16())
            .or_else(|| self.udp_ports.get(&src.to_u16()));
        match decoder {
            Some(decoder) => run(*decoder, self, data, ctx),
            None => Node::anonymous(data.to_vec()),
        }
    }
}

/// Invoke a decoder, downgrading any rejection to an illegal leaf
fn run(decoder: DecodeFn, registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Node {
    match decoder(registry, data, ctx) {
        Ok(node) => node,
        Err(cause) => {
            warn!(%cause, len = data.len(), "decoder rejected input, keeping bytes as illegal data");
            Node::illegal(data.to_vec(), cause)
        }
    }
}

/// An IPv6 "no next header" payload: opaque, valid octets
fn decode_no_next_header(_registry: &Registry, data: &[u8], _ctx: &DecodeContext) -> Result<Node> {
    Ok(Node::anonymous(data.to_vec()))
}

/// Raw-IP link layer: select IPv4 or IPv6 by the version nibble
fn decode_raw_ip(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    match data.first().map(|b| b >> 4) {
        Some(4) => ipv4::decode(registry, data, ctx),
        Some(6) => ipv6::decode(registry, data, ctx),
        _ => Err(wireform_core::Error::inconsistent(
            "Raw IP",
            "first nibble is neither 4 nor 6",
        )),
    }
}

static DEFAULT: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::new();

    registry
        .register_link_layer(LinkLayer::Ethernet, ethernet::decode)
        .register_link_layer(LinkLayer::RawIp, decode_raw_ip);

    registry
        .register_ether_type(EtherType::Ipv4, ipv4::decode)
        .register_ether_type(EtherType::Arp, arp::decode)
        .register_ether_type(EtherType::Vlan, dot1q::decode)
        .register_ether_type(EtherType::QinQ, dot1q::decode)
        .register_ether_type(EtherType::Ipv6, ipv6::decode);

    registry
        .register_ip_number(IpNumber::HopByHop, ipv6::decode_hop_by_hop)
        .register_ip_number(IpNumber::Icmpv4, icmpv4::decode)
        .register_ip_number(IpNumber::Ipv4, ipv4::decode)
        .register_ip_number(IpNumber::Tcp, tcp::decode)
        .register_ip_number(IpNumber::Udp, udp::decode)
        .register_ip_number(IpNumber::Ipv6, ipv6::decode)
        .register_ip_number(IpNumber::Ipv6Route, ipv6::decode_routing)
        .register_ip_number(IpNumber::Ipv6Frag, ipv6::decode_fragment)
        .register_ip_number(IpNumber::Icmpv6, icmpv6::decode)
        .register_ip_number(IpNumber::NoNextHeader, decode_no_next_header)
        .register_ip_number(IpNumber::Ipv6DestOpts, ipv6::decode_dest_options);

    registry
});

/// The built-in registry covering every implemented protocol
pub fn default_registry() -> &'static Registry {
    &DEFAULT
}
