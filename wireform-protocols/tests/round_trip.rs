//! End-to-end round-trip properties: build a packet, serialize it,
//! decode the bytes, and compare wire images.

use std::net::{Ipv4Addr, Ipv6Addr};

use wireform_core::{LinkLayer, MacAddr};
use wireform_protocols::builder::RawBuilder;
use wireform_protocols::decode;
use wireform_protocols::dot1q::Dot1qBuilder;
use wireform_protocols::ethernet::{EtherType, EthernetBuilder};
use wireform_protocols::icmpv4::Icmpv4Builder;
use wireform_protocols::ip_number::IpNumber;
use wireform_protocols::ipv4::Ipv4Builder;
use wireform_protocols::ipv6::{Ipv6Builder, Ipv6OptionsBuilder};
use wireform_protocols::tcp::{TcpBuilder, TcpFlags, TcpOption, TcpPort};
use wireform_protocols::udp::{UdpBuilder, UdpPort};

fn src_mac() -> MacAddr {
    MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
}

fn dst_mac() -> MacAddr {
    MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])
}

#[test]
fn ethernet_ipv4_udp_round_trip() {
    let frame = EthernetBuilder::new()
        .with_src_addr(src_mac())
        .with_dst_addr(dst_mac())
        .with_payload(
            Ipv4Builder::new()
                .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
                .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
                .with_payload(
                    UdpBuilder::new()
                        .with_src_port(UdpPort::new(4000))
                        .with_dst_port(UdpPort::DNS)
                        .with_payload(RawBuilder::new(b"hello, wire".to_vec())),
                ),
        )
        .build()
        .unwrap();

    let raw = frame.raw_octets();
    assert_eq!(frame.len(), raw.len());

    let reparsed = decode(&raw, LinkLayer::Ethernet);
    assert_eq!(reparsed.raw_octets(), raw);
    assert!(reparsed.is_valid());

    let ethernet = reparsed.header().unwrap().as_ethernet().unwrap();
    assert_eq!(ethernet.ether_type, EtherType::Ipv4);
    let ipv4 = reparsed.payload().unwrap();
    assert_eq!(
        ipv4.header().unwrap().as_ipv4().unwrap().protocol,
        IpNumber::Udp
    );
    let udp = ipv4.payload().unwrap();
    assert_eq!(
        udp.header().unwrap().as_udp().unwrap().dst_port,
        UdpPort::DNS
    );
    assert_eq!(udp.payload().unwrap().raw_octets().as_ref(), b"hello, wire");
}

#[test]
fn ethernet_ipv4_tcp_round_trip_with_options() {
    let frame = EthernetBuilder::new()
        .with_src_addr(src_mac())
        .with_dst_addr(dst_mac())
        .with_payload(
            Ipv4Builder::new()
                .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
                .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
                .with_payload(
                    TcpBuilder::new()
                        .with_src_port(TcpPort::new(49152))
                        .with_dst_port(TcpPort::HTTP)
                        .with_sequence(0x01020304)
                        .with_flags(TcpFlags::SYN)
                        .with_option(TcpOption::MaximumSegmentSize(1460))
                        .with_option(TcpOption::EndOfOptionList),
                ),
        )
        .build()
        .unwrap();

    let raw = frame.raw_octets();
    let reparsed = decode(&raw, LinkLayer::Ethernet);
    assert_eq!(reparsed.raw_octets(), raw);
    assert!(reparsed.is_valid());

    let tcp = reparsed
        .find_header(|h| h.as_tcp())
        .expect("TCP layer survives the round trip");
    // MSS + EOL: exactly two options, padded to the 4-byte boundary,
    // data offset covering the whole header in 4-byte units
    assert_eq!(tcp.options.len(), 2);
    assert_eq!(tcp.options[0], TcpOption::MaximumSegmentSize(1460));
    assert_eq!(tcp.options[1], TcpOption::EndOfOptionList);
    assert_eq!(tcp.options_padding.len(), 3);
    assert_eq!(tcp.data_offset as usize * 4, tcp.len());
    assert_eq!(tcp.len(), 28);
}

#[test]
fn vlan_tag_round_trip_recovers_tci_fields() {
    let frame = EthernetBuilder::new()
        .with_src_addr(src_mac())
        .with_dst_addr(dst_mac())
        .with_payload(
            Dot1qBuilder::new()
                .with_priority(5)
                .with_cfi(true)
                .with_vid(100)
                .with_payload(
                    Ipv4Builder::new()
                        .with_src_addr(Ipv4Addr::new(10, 0, 0, 1))
                        .with_dst_addr(Ipv4Addr::new(10, 0, 0, 2))
                        .with_protocol(IpNumber::Udp),
                ),
        )
        .build()
        .unwrap();

    let reparsed = decode(&frame.raw_octets(), LinkLayer::Ethernet);
    assert_eq!(
        reparsed.header().unwrap().as_ethernet().unwrap().ether_type,
        EtherType::Vlan
    );
    let tag = reparsed
        .find_header(|h| h.as_dot1q())
        .expect("VLAN tag survives the round trip");
    assert_eq!(tag.priority, 5);
    assert!(tag.cfi);
    assert_eq!(tag.vid, 100);
    assert_eq!(tag.ether_type, EtherType::Ipv4);
}

#[test]
fn ipv6_extension_chain_round_trip() {
    let packet = Ipv6Builder::new()
        .with_src_addr("2001:db8::1".parse::<Ipv6Addr>().unwrap())
        .with_dst_addr("2001:db8::2".parse::<Ipv6Addr>().unwrap())
        .with_payload(
            Ipv6OptionsBuilder::new()
                .with_payload(
                    UdpBuilder::new()
                        .with_src_port(UdpPort::new(5000))
                        .with_dst_port(UdpPort::new(6000))
                        .with_payload(RawBuilder::new(b"v6 payload".to_vec())),
                )
                .hop_by_hop(),
        )
        .build()
        .unwrap();

    let raw = packet.raw_octets();
    let reparsed = decode(&raw, LinkLayer::RawIp);
    assert_eq!(reparsed.raw_octets(), raw);
    assert!(reparsed.is_valid());

    let ipv6 = reparsed.header().unwrap().as_ipv6().unwrap();
    assert_eq!(ipv6.next_header, IpNumber::HopByHop);
    // Chain: IPv6 -> hop-by-hop -> UDP -> data
    let hop = reparsed.payload().unwrap();
    assert_eq!(
        hop.header().unwrap().as_ipv6_options().unwrap().next_header,
        IpNumber::Udp
    );
    let udp = hop.payload().unwrap();
    assert!(udp.header().unwrap().as_udp().is_some());
    // The UDP checksum was computed against the v6 pseudo-header with
    // the transport's own protocol number, so validation passes
    assert!(udp.is_valid());
}

#[test]
fn icmp_echo_over_ipv4_round_trip() {
    let packet = Ipv4Builder::new()
        .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
        .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
        .with_payload(
            Icmpv4Builder::echo(0x77, 3).with_payload(RawBuilder::new(vec![0u8; 32])),
        )
        .build()
        .unwrap();

    let raw = packet.raw_octets();
    let reparsed = decode(&raw, LinkLayer::RawIp);
    assert_eq!(reparsed.raw_octets(), raw);
    assert!(reparsed.is_valid());
    assert!(reparsed.find_header(|h| h.as_icmpv4()).is_some());
}

#[test]
fn decode_to_builder_build_reproduces_bytes() {
    let frame = EthernetBuilder::new()
        .with_src_addr(src_mac())
        .with_dst_addr(dst_mac())
        .with_payload(
            Ipv4Builder::new()
                .with_src_addr(Ipv4Addr::new(198, 51, 100, 1))
                .with_dst_addr(Ipv4Addr::new(198, 51, 100, 2))
                .with_identification(0x1337)
                .with_payload(
                    TcpBuilder::new()
                        .with_src_port(TcpPort::new(5001))
                        .with_dst_port(TcpPort::HTTPS)
                        .with_flags(TcpFlags::ACK)
                        .with_payload(RawBuilder::new(b"abcdefgh".to_vec())),
                ),
        )
        .build()
        .unwrap();
    let raw = frame.raw_octets();

    let decoded = decode(&raw, LinkLayer::Ethernet);
    let rebuilt = decoded.to_builder().build().unwrap();
    assert_eq!(rebuilt.raw_octets(), raw);
}

#[test]
fn length_invariant_holds_across_layers() {
    let frame = EthernetBuilder::new()
        .with_src_addr(src_mac())
        .with_dst_addr(dst_mac())
        .with_payload(
            Ipv4Builder::new()
                .with_src_addr(Ipv4Addr::new(192, 0, 2, 1))
                .with_dst_addr(Ipv4Addr::new(192, 0, 2, 2))
                .with_payload(
                    UdpBuilder::new()
                        .with_src_port(UdpPort::new(1))
                        .with_dst_port(UdpPort::new(2)),
                ),
        )
        .build()
        .unwrap();

    let decoded = decode(&frame.raw_octets(), LinkLayer::Ethernet);
    for node in decoded.iter() {
        assert_eq!(node.len(), node.raw_octets().len());
    }
}
