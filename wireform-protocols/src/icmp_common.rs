//! Embedding a truncated invoking packet in ICMP error messages
//!
//! An ICMP error message carries a prefix of the packet that triggered
//! it: the inner IP header plus a fixed byte budget of its payload
//! (historically 64 bits). The embedded copy's fields stay verbatim —
//! it no longer represents a complete packet, so every auto-correction
//! in the derived builder chain is disabled.

use wireform_core::{Error, Result};

use crate::builder::{Builder, RawBuilder};
use crate::node::Node;

/// Bytes of the invoking packet's payload kept beyond its IP header
pub const INVOKING_PACKET_PAYLOAD_BUDGET: usize = 8;

/// Derive a builder for the invoking-packet field of an ICMP error
///
/// `original` must be the IPv4 or IPv6 node that triggered the error.
/// The returned builder reproduces the original's IP header verbatim
/// and caps everything after it to `payload_budget` bytes:
///
/// - an inner transport layer whose header fits the budget keeps its
///   typed builder with a truncated raw payload and corrections off;
/// - otherwise the whole capped span becomes one raw payload.
pub fn invoking_packet(original: &Node, payload_budget: usize) -> Result<Builder> {
    let is_ip_layer = original
        .header()
        .map(|h| h.as_ipv4().is_some() || h.as_ipv6().is_some())
        .unwrap_or(false);
    if !is_ip_layer {
        return Err(Error::missing_field("ICMP invoking packet", "IP layer"));
    }

    let mut ip_builder = original.to_builder();
    ip_builder.disable_corrections();

    let Some(payload_node) = original.payload() else {
        return Ok(ip_builder);
    };
    let payload_raw = payload_node.raw_octets();

    if payload_raw.len() <= payload_budget {
        // Fits whole; freeze the derived chain so it serializes verbatim
        let mut current = ip_builder.payload_builder_mut();
        while let Some(builder) = current {
            builder.disable_corrections();
            current = builder.payload_builder_mut();
        }
        return Ok(ip_builder);
    }

    match payload_node.header() {
        Some(header) if header.len() <= payload_budget => {
            let keep = payload_budget - header.len();
            let inner_raw = payload_node
                .payload()
                .map(|p| p.raw_octets())
                .unwrap_or_default();
            let transport = ip_builder
                .payload_builder_mut()
                .expect("layer payload seeds a payload builder");
            transport.disable_corrections();
            if keep == 0 {
                transport.take_payload_builder();
            } else {
                transport.set_payload_builder(Builder::Raw(RawBuilder::new(
                    inner_raw.slice(..keep.min(inner_raw.len())),
                )));
            }
        }
        _ => {
            ip_builder.set_payload_builder(Builder::Raw(RawBuilder::new(
                payload_raw.slice(..payload_budget),
            )));
        }
    }

    Ok(ip_builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildContext;
    use crate::ipv4::Ipv4Builder;
    use crate::tcp::{TcpBuilder, TcpPort};
    use crate::udp::{UdpBuilder, UdpPort};
    use std::net::Ipv4Addr;

    fn original_udp(payload: Vec<u8>) -> Node {
        Ipv4Builder::new()
            .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
            .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
            .with_payload(
                UdpBuilder::new()
                    .with_src_port(UdpPort::new(4000))
                    .with_dst_port(UdpPort::new(5000))
                    .with_payload(RawBuilder::new(payload)),
            )
            .build_in(&BuildContext::default())
            .unwrap()
    }

    #[test]
    fn test_long_udp_payload_is_capped_at_budget() {
        let original = original_udp(vec![0xab; 100]);
        let builder =
            invoking_packet(&original, INVOKING_PACKET_PAYLOAD_BUDGET).unwrap();
        let embedded = builder.build().unwrap();

        // IP header (20) + budget (8): the UDP header survives, its
        // payload is gone
        assert_eq!(embedded.len(), 28);
        let original_raw = original.raw_octets();
        assert_eq!(embedded.raw_octets().as_ref(), &original_raw[..28]);

        // The embedded copy keeps the original (now inconsistent)
        // length fields, so it is not a valid packet
        let ip = embedded.header().unwrap().as_ipv4().unwrap();
        assert_eq!(ip.total_length, original_raw.len() as u16);
        assert!(!embedded.is_valid());
    }

    #[test]
    fn test_short_packet_embeds_whole() {
        let original = original_udp(vec![]);
        let builder = invoking_packet(&original, INVOKING_PACKET_PAYLOAD_BUDGET).unwrap();
        let embedded = builder.build().unwrap();
        assert_eq!(embedded.raw_octets(), original.raw_octets());
    }

    #[test]
    fn test_tcp_header_exceeding_budget_becomes_raw() {
        let original = Ipv4Builder::new()
            .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
            .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
            .with_payload(
                TcpBuilder::new()
                    .with_src_port(TcpPort::new(4000))
                    .with_dst_port(TcpPort::HTTP)
                    .with_payload(RawBuilder::new(vec![1u8; 50])),
            )
            .build_in(&BuildContext::default())
            .unwrap();

        let builder = invoking_packet(&original, INVOKING_PACKET_PAYLOAD_BUDGET).unwrap();
        let embedded = builder.build().unwrap();

        assert_eq!(embedded.len(), 28);
        assert_eq!(
            embedded.raw_octets().as_ref(),
            &original.raw_octets()[..28]
        );
        // The 20-byte TCP header cannot fit an 8-byte budget: the
        // embedded payload is a raw leaf, not a TCP layer
        assert!(embedded.payload().unwrap().is_anonymous());
    }

    #[test]
    fn test_non_ip_node_is_rejected() {
        let err = invoking_packet(&Node::anonymous(vec![1u8, 2]), 8).unwrap_err();
        assert_eq!(err, Error::missing_field("ICMP invoking packet", "IP layer"));
    }
}
