//! The packet node chain
//!
//! A [`Node`] is one decoded or built unit of a protocol stack: a
//! header plus an optional inner payload, which is itself a node — a
//! singly-linked chain of typed segments ending in a leaf. Nodes are
//! immutable after construction; the wire image and validity verdict
//! are memoized at most once. Producing a changed variant means
//! deriving a [`Builder`](crate::builder::Builder) with
//! [`Node::to_builder`], mutating it, and building a new node.

use std::fmt;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use bytes::{Bytes, BytesMut};
use once_cell::sync::OnceCell;
use wireform_core::Error;

use crate::arp::ArpHeader;
use crate::builder::{Builder, RawBuilder};
use crate::dot1q::Dot1qHeader;
use crate::ethernet::EthernetHeader;
use crate::icmpv4::Icmpv4Header;
use crate::icmpv6::Icmpv6Header;
use crate::ipv4::Ipv4Header;
use crate::ipv6::{Ipv6FragmentHeader, Ipv6Header, Ipv6OptionsHeader, Ipv6RoutingHeader};
use crate::tcp::TcpHeader;
use crate::udp::UdpHeader;

/// Outcome of decode-time checksum verification for layers whose
/// checksum covers material outside their own octets (pseudo-headers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumStatus {
    /// Verified against the covering region and matched
    Valid,
    /// Verified against the covering region and did not match
    Invalid,
    /// Not verified (verification disabled, or no enclosing IP layer)
    #[default]
    Unverified,
}

impl ChecksumStatus {
    /// Invalid fails validity; Valid and Unverified do not
    pub fn passes(self) -> bool {
        self != ChecksumStatus::Invalid
    }
}

/// The fixed/variable leading octets one protocol layer owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Ethernet(EthernetHeader),
    Dot1q(Dot1qHeader),
    Arp(ArpHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Ipv6HopByHop(Ipv6OptionsHeader),
    Ipv6Routing(Ipv6RoutingHeader),
    Ipv6Fragment(Ipv6FragmentHeader),
    Ipv6DestOptions(Ipv6OptionsHeader),
    Icmpv4(Icmpv4Header),
    Icmpv6(Icmpv6Header),
    Tcp(TcpHeader),
    Udp(UdpHeader),
}

macro_rules! header_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                Header::$variant(h) => Some(h),
                _ => None,
            }
        }
    };
}

impl Header {
    /// The header's length in bytes
    pub fn len(&self) -> usize {
        match self {
            Header::Ethernet(h) => h.len(),
            Header::Dot1q(h) => h.len(),
            Header::Arp(h) => h.len(),
            Header::Ipv4(h) => h.len(),
            Header::Ipv6(h) => h.len(),
            Header::Ipv6HopByHop(h) | Header::Ipv6DestOptions(h) => h.len(),
            Header::Ipv6Routing(h) => h.len(),
            Header::Ipv6Fragment(h) => h.len(),
            Header::Icmpv4(h) => h.len(),
            Header::Icmpv6(h) => h.len(),
            Header::Tcp(h) => h.len(),
            Header::Udp(h) => h.len(),
        }
    }

    /// True when the header has no octets (never, for current protocols)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The protocol name, for diagnostics
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Header::Ethernet(_) => "Ethernet",
            Header::Dot1q(_) => "802.1Q",
            Header::Arp(_) => "ARP",
            Header::Ipv4(_) => "IPv4",
            Header::Ipv6(_) => "IPv6",
            Header::Ipv6HopByHop(_) => "IPv6 Hop-by-Hop Options",
            Header::Ipv6Routing(_) => "IPv6 Routing",
            Header::Ipv6Fragment(_) => "IPv6 Fragment",
            Header::Ipv6DestOptions(_) => "IPv6 Destination Options",
            Header::Icmpv4(_) => "ICMPv4",
            Header::Icmpv6(_) => "ICMPv6",
            Header::Tcp(_) => "TCP",
            Header::Udp(_) => "UDP",
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        match self {
            Header::Ethernet(h) => h.write(buf),
            Header::Dot1q(h) => h.write(buf),
            Header::Arp(h) => h.write(buf),
            Header::Ipv4(h) => h.write(buf),
            Header::Ipv6(h) => h.write(buf),
            Header::Ipv6HopByHop(h) | Header::Ipv6DestOptions(h) => h.write(buf),
            Header::Ipv6Routing(h) => h.write(buf),
            Header::Ipv6Fragment(h) => h.write(buf),
            Header::Icmpv4(h) => h.write(buf),
            Header::Icmpv6(h) => h.write(buf),
            Header::Tcp(h) => h.write(buf),
            Header::Udp(h) => h.write(buf),
        }
    }

    /// Protocol-specific header validity, given the payload length the
    /// enclosing layer actually carries
    pub(crate) fn is_valid(&self, payload_len: usize) -> bool {
        match self {
            Header::Ethernet(_) | Header::Dot1q(_) | Header::Arp(_) => true,
            Header::Ipv4(h) => h.is_valid(payload_len),
            Header::Ipv6(h) => h.is_valid(payload_len),
            Header::Ipv6HopByHop(h) | Header::Ipv6DestOptions(h) => h.is_valid(),
            Header::Ipv6Routing(h) => h.is_valid(),
            Header::Ipv6Fragment(_) => true,
            Header::Icmpv4(h) => h.is_valid(),
            Header::Icmpv6(h) => h.is_valid(),
            Header::Tcp(h) => h.is_valid(),
            Header::Udp(h) => h.is_valid(payload_len),
        }
    }

    header_accessor!(as_ethernet, Ethernet, EthernetHeader);
    header_accessor!(as_dot1q, Dot1q, Dot1qHeader);
    header_accessor!(as_arp, Arp, ArpHeader);
    header_accessor!(as_ipv4, Ipv4, Ipv4Header);
    header_accessor!(as_ipv6, Ipv6, Ipv6Header);
    header_accessor!(as_ipv6_routing, Ipv6Routing, Ipv6RoutingHeader);
    header_accessor!(as_ipv6_fragment, Ipv6Fragment, Ipv6FragmentHeader);
    header_accessor!(as_icmpv4, Icmpv4, Icmpv4Header);
    header_accessor!(as_icmpv6, Icmpv6, Icmpv6Header);
    header_accessor!(as_tcp, Tcp, TcpHeader);
    header_accessor!(as_udp, Udp, UdpHeader);

    /// Hop-by-hop or destination options header
    pub fn as_ipv6_options(&self) -> Option<&Ipv6OptionsHeader> {
        match self {
            Header::Ipv6HopByHop(h) | Header::Ipv6DestOptions(h) => Some(h),
            _ => None,
        }
    }
}

/// One protocol layer: a header, the next inner node, and any trailing
/// octets the layer carries after its payload (Ethernet minimum-frame
/// padding, octets beyond an IPv4 total length)
#[derive(Debug, Clone)]
pub struct Layer {
    header: Header,
    payload: Option<Box<Node>>,
    trailer: Bytes,
    raw: OnceCell<Bytes>,
    valid: OnceCell<bool>,
}

impl Layer {
    fn raw(&self) -> &Bytes {
        self.raw.get_or_init(|| {
            let payload_len = self.payload.as_ref().map_or(0, |p| p.len());
            let mut buf =
                BytesMut::with_capacity(self.header.len() + payload_len + self.trailer.len());
            self.header.write(&mut buf);
            if let Some(payload) = &self.payload {
                buf.extend_from_slice(&payload.raw_octets());
            }
            buf.extend_from_slice(&self.trailer);
            buf.freeze()
        })
    }

    fn is_valid(&self) -> bool {
        *self.valid.get_or_init(|| {
            let payload_len = self.payload.as_ref().map_or(0, |p| p.len());
            self.header.is_valid(payload_len)
                && self.payload.as_ref().map_or(true, |p| p.is_valid())
        })
    }
}

/// Octets that failed their protocol's structural minimum, preserved
/// verbatim together with the causing error
#[derive(Debug, Clone)]
pub struct IllegalData {
    /// The offending octets, exactly as supplied
    pub octets: Bytes,
    /// What the decoder objected to
    pub cause: Error,
}

/// A decoded or built unit of one protocol layer
#[derive(Debug, Clone)]
pub enum Node {
    /// A protocol layer with a header and optional inner payload
    Layer(Layer),
    /// Opaque octets with no further interpretation; valid by definition
    Anonymous(Bytes),
    /// A recognized protocol identifier with no decoder implemented
    Unknown(Bytes),
    /// Octets a decoder rejected, preserved so the rest of the capture
    /// stays usable
    Illegal(IllegalData),
}

impl Node {
    /// Assemble a layer node
    pub fn layer(header: Header, payload: Option<Node>, trailer: Bytes) -> Node {
        Node::Layer(Layer {
            header,
            payload: payload.map(Box::new),
            trailer,
            raw: OnceCell::new(),
            valid: OnceCell::new(),
        })
    }

    /// An anonymous leaf: opaque bytes, no interpretation
    pub fn anonymous(octets: impl Into<Bytes>) -> Node {
        Node::Anonymous(octets.into())
    }

    /// An unknown leaf: recognized but unimplemented protocol
    pub fn unknown(octets: impl Into<Bytes>) -> Node {
        Node::Unknown(octets.into())
    }

    /// An illegal leaf preserving bytes a decoder rejected
    pub fn illegal(octets: impl Into<Bytes>, cause: Error) -> Node {
        Node::Illegal(IllegalData {
            octets: octets.into(),
            cause,
        })
    }

    /// The node's total length in bytes, header plus payload plus trailer
    pub fn len(&self) -> usize {
        match self {
            Node::Layer(layer) => {
                layer.header.len()
                    + layer.payload.as_ref().map_or(0, |p| p.len())
                    + layer.trailer.len()
            }
            Node::Anonymous(octets) | Node::Unknown(octets) => octets.len(),
            Node::Illegal(data) => data.octets.len(),
        }
    }

    /// True when the node serializes to no octets
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The exact wire image of this node and everything inside it
    ///
    /// Memoized: computed at most once per node.
    pub fn raw_octets(&self) -> Bytes {
        match self {
            Node::Layer(layer) => layer.raw().clone(),
            Node::Anonymous(octets) | Node::Unknown(octets) => octets.clone(),
            Node::Illegal(data) => data.octets.clone(),
        }
    }

    /// Validity of this node and everything inside it
    ///
    /// A layer is valid when its header passes its protocol-specific
    /// checks and its payload is valid. Anonymous and unknown leaves
    /// are valid by definition; illegal leaves are not. Memoized.
    pub fn is_valid(&self) -> bool {
        match self {
            Node::Layer(layer) => layer.is_valid(),
            Node::Anonymous(_) | Node::Unknown(_) => true,
            Node::Illegal(_) => false,
        }
    }

    /// Lowercase hex rendering of the wire image
    pub fn hex(&self) -> String {
        let raw = self.raw_octets();
        let mut out = String::with_capacity(raw.len() * 2);
        for byte in raw.iter() {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// The header this layer owns, if the node is a layer
    pub fn header(&self) -> Option<&Header> {
        match self {
            Node::Layer(layer) => Some(&layer.header),
            _ => None,
        }
    }

    /// The next inner node, if any
    pub fn payload(&self) -> Option<&Node> {
        match self {
            Node::Layer(layer) => layer.payload.as_deref(),
            _ => None,
        }
    }

    /// Trailing octets after the payload (padding), if the node is a layer
    pub fn trailer(&self) -> &[u8] {
        match self {
            Node::Layer(layer) => &layer.trailer,
            _ => &[],
        }
    }

    /// Walk the chain from this node inward, self included
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { next: Some(self) }
    }

    /// The innermost node of the chain
    pub fn innermost(&self) -> &Node {
        self.iter().last().expect("chain contains self")
    }

    /// First header in the chain matching the given accessor
    ///
    /// ```
    /// # use wireform_protocols::decode;
    /// # use wireform_core::LinkLayer;
    /// # let node = decode(&[0u8; 14], LinkLayer::Ethernet);
    /// let ethernet = node.find_header(|h| h.as_ethernet());
    /// assert!(ethernet.is_some());
    /// ```
    pub fn find_header<'a, T: 'a>(
        &'a self,
        accessor: impl Fn(&'a Header) -> Option<&'a T>,
    ) -> Option<&'a T> {
        self.iter().find_map(|n| n.header().and_then(&accessor))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Node::Anonymous(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Node::Unknown(_))
    }

    pub fn is_illegal(&self) -> bool {
        matches!(self, Node::Illegal(_))
    }

    /// The illegal-leaf details, if this node is one
    pub fn illegal_data(&self) -> Option<&IllegalData> {
        match self {
            Node::Illegal(data) => Some(data),
            _ => None,
        }
    }

    /// Derive a mutable builder chain seeded from this node's fields
    ///
    /// Trailing padding is not carried over; builders recompute it.
    /// Sentinel leaves become raw payload builders holding the same
    /// octets.
    pub fn to_builder(&self) -> Builder {
        match self {
            Node::Layer(layer) => {
                let payload = layer.payload.as_ref().map(|p| p.to_builder());
                let mut builder = match &layer.header {
                    Header::Ethernet(h) => Builder::Ethernet(h.to_builder()),
                    Header::Dot1q(h) => Builder::Dot1q(h.to_builder()),
                    Header::Arp(h) => Builder::Arp(h.to_builder()),
                    Header::Ipv4(h) => Builder::Ipv4(h.to_builder()),
                    Header::Ipv6(h) => Builder::Ipv6(h.to_builder()),
                    Header::Ipv6HopByHop(h) => Builder::Ipv6HopByHop(h.to_builder()),
                    Header::Ipv6DestOptions(h) => Builder::Ipv6DestOptions(h.to_builder()),
                    Header::Ipv6Routing(h) => Builder::Ipv6Routing(h.to_builder()),
                    Header::Ipv6Fragment(h) => Builder::Ipv6Fragment(h.to_builder()),
                    Header::Icmpv4(h) => Builder::Icmpv4(h.to_builder()),
                    Header::Icmpv6(h) => Builder::Icmpv6(h.to_builder()),
                    Header::Tcp(h) => Builder::Tcp(h.to_builder()),
                    Header::Udp(h) => Builder::Udp(h.to_builder()),
                };
                if let Some(payload) = payload {
                    builder.set_payload_builder(payload);
                }
                builder
            }
            Node::Anonymous(octets) | Node::Unknown(octets) => {
                Builder::Raw(RawBuilder::new(octets.clone()))
            }
            Node::Illegal(data) => Builder::Raw(RawBuilder::new(data.octets.clone())),
        }
    }
}

/// Iterator over a node chain, outermost first
pub struct NodeIter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.payload();
        Some(current)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.raw_octets() == other.raw_octets()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.raw_octets());
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Layer(layer) => {
                write!(f, "[{}, {} bytes]", layer.header.protocol_name(), self.len())?;
                if let Some(payload) = &layer.payload {
                    write!(f, " {payload}")?;
                }
                Ok(())
            }
            Node::Anonymous(octets) => write!(f, "[data, {} bytes]", octets.len()),
            Node::Unknown(octets) => write!(f, "[unknown, {} bytes]", octets.len()),
            Node::Illegal(data) => {
                write!(f, "[illegal, {} bytes: {}]", data.octets.len(), data.cause)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_leaves() {
        let anon = Node::anonymous(vec![1, 2, 3]);
        assert!(anon.is_anonymous());
        assert!(anon.is_valid());
        assert_eq!(anon.len(), 3);
        assert_eq!(anon.raw_octets(), Bytes::from_static(&[1, 2, 3]));

        let unknown = Node::unknown(vec![9, 9]);
        assert!(unknown.is_unknown());
        assert!(unknown.is_valid());

        let illegal = Node::illegal(vec![0xde, 0xad], Error::truncated("IPv4", 20, 2));
        assert!(illegal.is_illegal());
        assert!(!illegal.is_valid());
        assert_eq!(illegal.raw_octets(), Bytes::from_static(&[0xde, 0xad]));
        assert_eq!(
            illegal.illegal_data().unwrap().cause,
            Error::truncated("IPv4", 20, 2)
        );
    }

    #[test]
    fn test_hex_rendering() {
        let node = Node::anonymous(vec![0x0a, 0xff, 0x00]);
        assert_eq!(node.hex(), "0aff00");
    }

    #[test]
    fn test_equality_is_over_wire_image() {
        let a = Node::anonymous(vec![1, 2, 3]);
        let b = Node::unknown(vec![1, 2, 3]);
        // Different sentinel kinds, same octets: equal on the wire
        assert_eq!(a, b);
    }

    #[test]
    fn test_checksum_status_passes() {
        assert!(ChecksumStatus::Valid.passes());
        assert!(ChecksumStatus::Unverified.passes());
        assert!(!ChecksumStatus::Invalid.passes());
    }
}
