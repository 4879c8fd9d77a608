//! Packet object model and codec framework
//!
//! This crate turns raw octet sequences captured from a network link
//! into a typed, recursively-structured chain of protocol layers
//! (Ethernet → VLAN/ARP/IP → TCP/UDP/ICMP → application bytes), and
//! turns a mutable builder chain back into exact wire bytes with
//! derived fields (lengths, checksums) computed automatically unless
//! the caller opts out.
//!
//! # Architecture
//!
//! - [`node`] - the immutable [`Node`] chain with memoized wire image
//!   and validity
//! - [`builder`] - the mutable [`Builder`] chain with depth-first build
//! - [`registry`] - the factory [`Registry`] dispatching payloads by
//!   identifier, downgrading malformed layers to sentinel leaves
//! - one module per protocol: [`ethernet`], [`dot1q`], [`arp`],
//!   [`ipv4`], [`ipv6`], [`icmpv4`], [`icmpv6`], [`tcp`], [`udp`]
//! - [`fragment`] - IPv4 fragmentation and reassembly
//! - [`icmp_common`] - the truncated invoking-packet embedding shared
//!   by ICMP error messages
//!
//! # Decoding a capture
//!
//! ```rust
//! use wireform_core::LinkLayer;
//! use wireform_protocols::decode;
//!
//! // A truncated Ethernet frame still decodes; whatever cannot be
//! // parsed is preserved as a sentinel leaf instead of an error.
//! let node = decode(&[0u8; 14], LinkLayer::Ethernet);
//! assert_eq!(node.len(), 14);
//! assert_eq!(node.raw_octets().len(), 14);
//! ```
//!
//! # Building a packet
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use wireform_core::{LinkLayer, MacAddr};
//! use wireform_protocols::builder::RawBuilder;
//! use wireform_protocols::ethernet::EthernetBuilder;
//! use wireform_protocols::ipv4::Ipv4Builder;
//! use wireform_protocols::udp::{UdpBuilder, UdpPort};
//! use wireform_protocols::decode;
//!
//! let frame = EthernetBuilder::new()
//!     .with_src_addr(MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]))
//!     .with_dst_addr(MacAddr::broadcast())
//!     .with_payload(
//!         Ipv4Builder::new()
//!             .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
//!             .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
//!             .with_payload(
//!                 UdpBuilder::new()
//!                     .with_src_port(UdpPort::new(4000))
//!                     .with_dst_port(UdpPort::DNS)
//!                     .with_payload(RawBuilder::new(b"hello".to_vec())),
//!             ),
//!     )
//!     .build()
//!     .unwrap();
//!
//! // Byte-exact round trip through the decoder
//! let reparsed = decode(&frame.raw_octets(), LinkLayer::Ethernet);
//! assert_eq!(reparsed.raw_octets(), frame.raw_octets());
//! assert!(reparsed.is_valid());
//! ```

pub mod arp;
pub mod builder;
pub mod context;
pub mod dot1q;
pub mod ethernet;
pub mod fragment;
pub mod icmp_common;
pub mod icmpv4;
pub mod icmpv6;
pub mod ip_number;
pub mod ipv4;
pub mod ipv6;
pub mod node;
pub mod registry;
pub mod tcp;
pub mod udp;

pub use builder::Builder;
pub use context::{BuildContext, DecodeContext, PseudoHeader};
pub use ip_number::IpNumber;
pub use node::{ChecksumStatus, Header, IllegalData, Node};
pub use registry::{default_registry, DecodeFn, Registry};

use wireform_core::LinkLayer;

/// Decode a capture through the built-in registry
///
/// Never fails: unrecognized or malformed layers become sentinel
/// leaves, preserving their bytes.
pub fn decode(data: &[u8], link: LinkLayer) -> Node {
    default_registry().decode_link(link, data)
}
