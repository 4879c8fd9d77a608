//! The builder chain
//!
//! Builders mirror the node chain: each protocol builder stages
//! mutable field values and optionally holds the next layer's builder.
//! Building is depth-first — a builder first builds its payload
//! builder to obtain the finished inner node, then computes its own
//! header from that node's length and octets (deriving lengths and
//! checksums unless the caller opted out), and returns an immutable
//! [`Node`].
//!
//! Builders are single-owner staging objects; they are not shared
//! between threads during the mutate-then-build sequence.

use bytes::Bytes;
use wireform_core::Result;

use crate::arp::ArpBuilder;
use crate::context::BuildContext;
use crate::dot1q::Dot1qBuilder;
use crate::ethernet::{EtherType, EthernetBuilder};
use crate::icmpv4::Icmpv4Builder;
use crate::icmpv6::Icmpv6Builder;
use crate::ip_number::IpNumber;
use crate::ipv4::Ipv4Builder;
use crate::ipv6::{Ipv6Builder, Ipv6FragmentBuilder, Ipv6OptionsBuilder, Ipv6RoutingBuilder};
use crate::node::Node;
use crate::tcp::TcpBuilder;
use crate::udp::UdpBuilder;

/// Mutable staging object producing one [`Node`] per protocol layer
#[derive(Debug, Clone)]
pub enum Builder {
    Ethernet(EthernetBuilder),
    Dot1q(Dot1qBuilder),
    Arp(ArpBuilder),
    Ipv4(Ipv4Builder),
    Ipv6(Ipv6Builder),
    Ipv6HopByHop(Ipv6OptionsBuilder),
    Ipv6Routing(Ipv6RoutingBuilder),
    Ipv6Fragment(Ipv6FragmentBuilder),
    Ipv6DestOptions(Ipv6OptionsBuilder),
    Icmpv4(Icmpv4Builder),
    Icmpv6(Icmpv6Builder),
    Tcp(TcpBuilder),
    Udp(UdpBuilder),
    Raw(RawBuilder),
}

impl Builder {
    /// Build the chain into an immutable node
    ///
    /// Fails fast on builder preconditions: missing required fields,
    /// values that do not fit their bit width, or a checksum-correcting
    /// transport layer with no enclosing IP layer to supply addresses.
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    /// Build with explicit context from an enclosing layer
    pub fn build_in(&self, ctx: &BuildContext) -> Result<Node> {
        match self {
            Builder::Ethernet(b) => b.build_in(ctx),
            Builder::Dot1q(b) => b.build_in(ctx),
            Builder::Arp(b) => b.build_in(ctx),
            Builder::Ipv4(b) => b.build_in(ctx),
            Builder::Ipv6(b) => b.build_in(ctx),
            Builder::Ipv6HopByHop(b) => b.build_in(ctx, false),
            Builder::Ipv6DestOptions(b) => b.build_in(ctx, true),
            Builder::Ipv6Routing(b) => b.build_in(ctx),
            Builder::Ipv6Fragment(b) => b.build_in(ctx),
            Builder::Icmpv4(b) => b.build_in(ctx),
            Builder::Icmpv6(b) => b.build_in(ctx),
            Builder::Tcp(b) => b.build_in(ctx),
            Builder::Udp(b) => b.build_in(ctx),
            Builder::Raw(b) => b.build_in(ctx),
        }
    }

    /// The next layer's builder, if this layer carries one
    pub fn payload_builder(&self) -> Option<&Builder> {
        match self {
            Builder::Ethernet(b) => b.payload.as_deref(),
            Builder::Dot1q(b) => b.payload.as_deref(),
            Builder::Ipv4(b) => b.payload.as_deref(),
            Builder::Ipv6(b) => b.payload.as_deref(),
            Builder::Ipv6HopByHop(b) | Builder::Ipv6DestOptions(b) => b.payload.as_deref(),
            Builder::Ipv6Routing(b) => b.payload.as_deref(),
            Builder::Ipv6Fragment(b) => b.payload.as_deref(),
            Builder::Icmpv4(b) => b.payload.as_deref(),
            Builder::Icmpv6(b) => b.payload.as_deref(),
            Builder::Tcp(b) => b.payload.as_deref(),
            Builder::Udp(b) => b.payload.as_deref(),
            Builder::Arp(_) | Builder::Raw(_) => None,
        }
    }

    /// Mutable access to the next layer's builder
    pub fn payload_builder_mut(&mut self) -> Option<&mut Builder> {
        match self {
            Builder::Ethernet(b) => b.payload.as_deref_mut(),
            Builder::Dot1q(b) => b.payload.as_deref_mut(),
            Builder::Ipv4(b) => b.payload.as_deref_mut(),
            Builder::Ipv6(b) => b.payload.as_deref_mut(),
            Builder::Ipv6HopByHop(b) | Builder::Ipv6DestOptions(b) => b.payload.as_deref_mut(),
            Builder::Ipv6Routing(b) => b.payload.as_deref_mut(),
            Builder::Ipv6Fragment(b) => b.payload.as_deref_mut(),
            Builder::Icmpv4(b) => b.payload.as_deref_mut(),
            Builder::Icmpv6(b) => b.payload.as_deref_mut(),
            Builder::Tcp(b) => b.payload.as_deref_mut(),
            Builder::Udp(b) => b.payload.as_deref_mut(),
            Builder::Arp(_) | Builder::Raw(_) => None,
        }
    }

    /// Replace the next layer's builder
    ///
    /// ARP and raw builders are terminal and carry no payload; the
    /// call is ignored for them.
    pub fn set_payload_builder(&mut self, payload: Builder) {
        let slot = match self {
            Builder::Ethernet(b) => &mut b.payload,
            Builder::Dot1q(b) => &mut b.payload,
            Builder::Ipv4(b) => &mut b.payload,
            Builder::Ipv6(b) => &mut b.payload,
            Builder::Ipv6HopByHop(b) | Builder::Ipv6DestOptions(b) => &mut b.payload,
            Builder::Ipv6Routing(b) => &mut b.payload,
            Builder::Ipv6Fragment(b) => &mut b.payload,
            Builder::Icmpv4(b) => &mut b.payload,
            Builder::Icmpv6(b) => &mut b.payload,
            Builder::Tcp(b) => &mut b.payload,
            Builder::Udp(b) => &mut b.payload,
            Builder::Arp(_) | Builder::Raw(_) => return,
        };
        *slot = Some(Box::new(payload));
    }

    /// Remove and return the next layer's builder
    pub fn take_payload_builder(&mut self) -> Option<Builder> {
        let slot = match self {
            Builder::Ethernet(b) => &mut b.payload,
            Builder::Dot1q(b) => &mut b.payload,
            Builder::Ipv4(b) => &mut b.payload,
            Builder::Ipv6(b) => &mut b.payload,
            Builder::Ipv6HopByHop(b) | Builder::Ipv6DestOptions(b) => &mut b.payload,
            Builder::Ipv6Routing(b) => &mut b.payload,
            Builder::Ipv6Fragment(b) => &mut b.payload,
            Builder::Icmpv4(b) => &mut b.payload,
            Builder::Icmpv6(b) => &mut b.payload,
            Builder::Tcp(b) => &mut b.payload,
            Builder::Udp(b) => &mut b.payload,
            Builder::Arp(_) | Builder::Raw(_) => return None,
        };
        slot.take().map(|b| *b)
    }

    /// Disable length and checksum auto-correction on this layer
    ///
    /// Used when a layer must serialize verbatim field values, e.g. the
    /// truncated copy of an invoking packet embedded in an ICMP error
    /// message.
    pub fn disable_corrections(&mut self) {
        match self {
            Builder::Ethernet(b) => b.pad = false,
            Builder::Ipv4(b) => {
                b.correct_length = false;
                b.correct_checksum = false;
            }
            Builder::Ipv6(b) => b.correct_length = false,
            Builder::Icmpv4(b) => b.correct_checksum = false,
            Builder::Icmpv6(b) => b.correct_checksum = false,
            Builder::Tcp(b) => b.correct_checksum = false,
            Builder::Udp(b) => {
                b.correct_length = false;
                b.correct_checksum = false;
            }
            Builder::Dot1q(_)
            | Builder::Arp(_)
            | Builder::Ipv6HopByHop(_)
            | Builder::Ipv6DestOptions(_)
            | Builder::Ipv6Routing(_)
            | Builder::Ipv6Fragment(_)
            | Builder::Raw(_) => {}
        }
    }

    /// The EtherType identifying this builder's protocol, for layers
    /// that derive an unset EtherType field from their payload builder
    pub(crate) fn ether_type_hint(&self) -> Option<EtherType> {
        match self {
            Builder::Ipv4(_) => Some(EtherType::Ipv4),
            Builder::Ipv6(_) => Some(EtherType::Ipv6),
            Builder::Arp(b) => Some(b.ether_type_hint()),
            Builder::Dot1q(_) => Some(EtherType::Vlan),
            _ => None,
        }
    }

    /// The IP protocol number identifying this builder's protocol, for
    /// layers that derive an unset protocol/next-header field from
    /// their payload builder
    pub(crate) fn ip_number_hint(&self) -> Option<IpNumber> {
        match self {
            Builder::Ipv4(_) => Some(IpNumber::Ipv4),
            Builder::Ipv6(_) => Some(IpNumber::Ipv6),
            Builder::Ipv6HopByHop(_) => Some(IpNumber::HopByHop),
            Builder::Ipv6Routing(_) => Some(IpNumber::Ipv6Route),
            Builder::Ipv6Fragment(_) => Some(IpNumber::Ipv6Frag),
            Builder::Ipv6DestOptions(_) => Some(IpNumber::Ipv6DestOpts),
            Builder::Icmpv4(_) => Some(IpNumber::Icmpv4),
            Builder::Icmpv6(_) => Some(IpNumber::Icmpv6),
            Builder::Tcp(_) => Some(IpNumber::Tcp),
            Builder::Udp(_) => Some(IpNumber::Udp),
            _ => None,
        }
    }
}

/// Terminal builder holding raw payload octets
#[derive(Debug, Clone, Default)]
pub struct RawBuilder {
    octets: Bytes,
}

impl RawBuilder {
    /// Stage raw payload octets
    pub fn new(octets: impl Into<Bytes>) -> Self {
        RawBuilder {
            octets: octets.into(),
        }
    }

    /// The staged octets
    pub fn octets(&self) -> &Bytes {
        &self.octets
    }

    /// Truncate the staged octets to at most `limit` bytes
    pub fn truncate(&mut self, limit: usize) {
        self.octets.truncate(limit);
    }

    pub(crate) fn build_in(&self, _ctx: &BuildContext) -> Result<Node> {
        Ok(Node::anonymous(self.octets.clone()))
    }
}

impl From<RawBuilder> for Builder {
    fn from(b: RawBuilder) -> Self {
        Builder::Raw(b)
    }
}
