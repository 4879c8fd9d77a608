//! IPv4 fragmentation and reassembly
//!
//! Splits a datagram's payload into MTU-sized chunks aligned to the
//! 8-byte fragment-offset unit, and reassembles a full fragment set
//! back into one builder. Reassembly validates that the fragments tile
//! a contiguous range; gaps, overlaps, or mismatched identity tuples
//! are errors, never a silent partial result.

use wireform_core::{Error, Result};

use crate::builder::RawBuilder;
use crate::ipv4::{Ipv4Builder, Ipv4Header};
use crate::node::Node;

/// Offsets and lengths of IPv4 fragments are expressed in this unit
pub const FRAGMENT_UNIT: usize = 8;

fn ipv4_header(node: &Node) -> Result<&Ipv4Header> {
    node.header()
        .and_then(|h| h.as_ipv4())
        .ok_or_else(|| Error::Fragmentation("node is not an IPv4 layer".to_string()))
}

fn fragment_payload(node: &Node) -> bytes::Bytes {
    node.payload().map(|p| p.raw_octets()).unwrap_or_default()
}

/// Split an IPv4 packet into fragments that fit `mtu`
///
/// Every fragment reuses the original header fields (identification
/// included) with a recomputed length and checksum; all but the last
/// carry the more-fragments flag. A packet already fitting the MTU
/// comes back as a single builder.
pub fn fragment(packet: &Node, mtu: usize) -> Result<Vec<Ipv4Builder>> {
    let header = ipv4_header(packet)?;
    let header_len = header.len();
    let payload = fragment_payload(packet);

    if header_len + payload.len() <= mtu {
        let mut builder = header.to_builder();
        if !payload.is_empty() {
            builder = builder.with_payload(RawBuilder::new(payload));
        }
        return Ok(vec![builder]);
    }

    if header.flags.dont_fragment {
        return Err(Error::Fragmentation(
            "don't-fragment flag is set".to_string(),
        ));
    }
    let chunk_size = mtu.saturating_sub(header_len) / FRAGMENT_UNIT * FRAGMENT_UNIT;
    if chunk_size == 0 {
        return Err(Error::Fragmentation(format!(
            "MTU {mtu} leaves no room for payload after a {header_len}-byte header"
        )));
    }

    let base_offset = header.fragment_offset as usize;
    let original_more_fragments = header.flags.more_fragments;
    let mut fragments = Vec::with_capacity(payload.len().div_ceil(chunk_size));

    for (index, chunk) in payload.chunks(chunk_size).enumerate() {
        let last = (index + 1) * chunk_size >= payload.len();
        let offset = base_offset + index * chunk_size / FRAGMENT_UNIT;
        if offset > 0x1fff {
            return Err(Error::Fragmentation(format!(
                "fragment offset {offset} exceeds 13 bits"
            )));
        }
        let flags = header
            .flags
            .with_more_fragments(!last || original_more_fragments);
        let builder = header
            .to_builder()
            .with_flags(flags)
            .with_fragment_offset(offset as u16)
            .with_payload(RawBuilder::new(chunk.to_vec()));
        fragments.push(builder);
    }

    Ok(fragments)
}

/// Reassemble a complete IPv4 fragment set into one builder
///
/// The fragments may arrive in any order. They must share the
/// identity tuple (source, destination, identification, protocol),
/// start at offset zero, tile the range without gaps or overlaps, and
/// include a final fragment with the more-fragments flag clear.
pub fn defragment(fragments: &[Node]) -> Result<Ipv4Builder> {
    if fragments.is_empty() {
        return Err(Error::Reassembly("no fragments supplied".to_string()));
    }

    let mut pieces = Vec::with_capacity(fragments.len());
    for node in fragments {
        let header = ipv4_header(node).map_err(|_| {
            Error::Reassembly("fragment is not an IPv4 layer".to_string())
        })?;
        pieces.push((header, fragment_payload(node)));
    }

    let identity = {
        let first = pieces[0].0;
        (
            first.src_addr,
            first.dst_addr,
            first.identification,
            first.protocol,
        )
    };
    for (header, _) in &pieces {
        let tuple = (
            header.src_addr,
            header.dst_addr,
            header.identification,
            header.protocol,
        );
        if tuple != identity {
            return Err(Error::Reassembly(format!(
                "fragment identity {:?} does not match {:?}",
                tuple, identity
            )));
        }
    }

    pieces.sort_by_key(|(header, _)| header.fragment_offset);

    let mut expected_offset = 0usize;
    let mut payload = Vec::new();
    let last_index = pieces.len() - 1;
    for (index, (header, bytes)) in pieces.iter().enumerate() {
        let offset = header.fragment_offset as usize * FRAGMENT_UNIT;
        if offset != expected_offset {
            return Err(Error::Reassembly(format!(
                "fragment at byte offset {offset} leaves a gap after {expected_offset}"
            )));
        }
        let is_last = index == last_index;
        if header.flags.more_fragments == is_last {
            return Err(Error::Reassembly(if is_last {
                "final fragment still carries more-fragments".to_string()
            } else {
                "non-final fragment lacks more-fragments".to_string()
            }));
        }
        if !is_last && bytes.len() % FRAGMENT_UNIT != 0 {
            return Err(Error::Reassembly(format!(
                "non-final fragment length {} is not a multiple of {FRAGMENT_UNIT}",
                bytes.len()
            )));
        }
        payload.extend_from_slice(bytes);
        expected_offset = offset + bytes.len();
    }

    let first = pieces[0].0;
    let builder = first
        .to_builder()
        .with_flags(first.flags.with_more_fragments(false))
        .with_fragment_offset(0)
        .with_payload(RawBuilder::new(payload));
    Ok(builder)
}
