//! Checksum correctness against an independent RFC 1071 reference
//! implementation, written out longhand here on purpose.

use std::net::Ipv4Addr;

use wireform_protocols::builder::RawBuilder;
use wireform_protocols::ipv4::Ipv4Builder;
use wireform_protocols::tcp::{TcpBuilder, TcpFlags, TcpPort};

const SRC: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);
const DST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 2);

/// Longhand RFC 1071: sum 16-bit words into a u64, fold twice, invert.
fn reference_checksum(regions: &[&[u8]]) -> u16 {
    let mut words: Vec<u16> = Vec::new();
    for region in regions {
        let mut iter = region.chunks(2);
        for chunk in &mut iter {
            let hi = chunk[0] as u16;
            let lo = if chunk.len() == 2 { chunk[1] as u16 } else { 0 };
            words.push((hi << 8) | lo);
        }
    }
    let mut sum: u64 = 0;
    for word in words {
        sum += word as u64;
    }
    sum = (sum & 0xffff) + (sum >> 16);
    sum = (sum & 0xffff) + (sum >> 16);
    !(sum as u16)
}

fn reference_tcp_checksum(segment_with_zero_checksum: &[u8]) -> u16 {
    let mut pseudo = Vec::new();
    pseudo.extend_from_slice(&SRC.octets());
    pseudo.extend_from_slice(&DST.octets());
    pseudo.push(0);
    pseudo.push(6);
    pseudo.extend_from_slice(&(segment_with_zero_checksum.len() as u16).to_be_bytes());
    reference_checksum(&[&pseudo, segment_with_zero_checksum])
}

fn build_segment(payload: &[u8]) -> Vec<u8> {
    Ipv4Builder::new()
        .with_src_addr(SRC)
        .with_dst_addr(DST)
        .with_payload(
            TcpBuilder::new()
                .with_src_port(TcpPort::new(49152))
                .with_dst_port(TcpPort::HTTP)
                .with_sequence(1)
                .with_flags(TcpFlags::ACK)
                .with_payload(RawBuilder::new(payload.to_vec())),
        )
        .build()
        .unwrap()
        .raw_octets()
        .to_vec()
}

#[test]
fn tcp_checksum_matches_independent_reference() {
    let payload = b"Hello, checksum!";
    let packet = build_segment(payload);

    // Extract the TCP segment (after the 20-byte IPv4 header) and zero
    // its checksum field for the reference computation
    let mut segment = packet[20..].to_vec();
    let wire_checksum = u16::from_be_bytes([segment[16], segment[17]]);
    segment[16] = 0;
    segment[17] = 0;

    assert_eq!(wire_checksum, reference_tcp_checksum(&segment));
}

#[test]
fn flipping_any_payload_bit_changes_the_checksum() {
    let payload = b"independent view";
    let packet = build_segment(payload);
    let baseline = u16::from_be_bytes([packet[20 + 16], packet[20 + 17]]);

    for byte in 0..payload.len() {
        for bit in 0..8 {
            let mut flipped = payload.to_vec();
            flipped[byte] ^= 1 << bit;
            let packet = build_segment(&flipped);
            let checksum = u16::from_be_bytes([packet[20 + 16], packet[20 + 17]]);
            assert_ne!(
                checksum, baseline,
                "flipping bit {bit} of byte {byte} left the checksum unchanged"
            );
        }
    }
}
