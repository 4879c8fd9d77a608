//! Decode and build contexts
//!
//! Transport checksums cover a pseudo-header built from the enclosing
//! IP layer's addresses. The dependency is one-directional (the outer
//! layer supplies addresses to the inner one), so the context is passed
//! down the chain explicitly — at decode time through [`DecodeContext`]
//! and at build time through [`BuildContext`].

use std::net::{Ipv4Addr, Ipv6Addr};

use wireform_packet::checksum::{pseudo_checksum_v4, pseudo_checksum_v6};

/// Virtual fields included in a transport checksum but never serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoHeader {
    /// IPv4 pseudo-header: 4-byte addresses, protocol, upper-layer length
    V4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        protocol: u8,
    },
    /// IPv6 pseudo-header: 16-byte addresses, next header, 32-bit length
    V6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        next_header: u8,
    },
}

impl PseudoHeader {
    /// The protocol/next-header number the pseudo-header carries
    pub fn protocol(&self) -> u8 {
        match self {
            PseudoHeader::V4 { protocol, .. } => *protocol,
            PseudoHeader::V6 { next_header, .. } => *next_header,
        }
    }

    /// Replace the protocol/next-header number
    ///
    /// IPv6 extension headers rewrite this as the chain is walked so
    /// the transport layer sees its own protocol number, not the first
    /// extension header's.
    pub fn with_protocol(self, protocol: u8) -> Self {
        match self {
            PseudoHeader::V4 { src, dst, .. } => PseudoHeader::V4 {
                src,
                dst,
                protocol,
            },
            PseudoHeader::V6 { src, dst, .. } => PseudoHeader::V6 {
                src,
                dst,
                next_header: protocol,
            },
        }
    }

    /// Checksum of `data` prefixed by this pseudo-header
    pub fn checksum(&self, data: &[u8]) -> u16 {
        match *self {
            PseudoHeader::V4 { src, dst, protocol } => pseudo_checksum_v4(src, dst, protocol, data),
            PseudoHeader::V6 {
                src,
                dst,
                next_header,
            } => pseudo_checksum_v6(src, dst, next_header, data),
        }
    }

    /// Verify a message whose checksum field is already filled in
    ///
    /// Summing a message together with a correct checksum complements
    /// to zero.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.checksum(data) == 0
    }
}

/// Context handed to decoders as the chain recurses inward
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeContext {
    /// Pseudo-header material from the enclosing IP layer, when any
    pub pseudo: Option<PseudoHeader>,
}

impl DecodeContext {
    /// Context carrying pseudo-header material for transport decoders
    pub fn with_pseudo(pseudo: PseudoHeader) -> Self {
        DecodeContext {
            pseudo: Some(pseudo),
        }
    }

    /// Same addresses, different protocol number
    pub fn for_next_protocol(&self, protocol: u8) -> Self {
        DecodeContext {
            pseudo: self.pseudo.map(|p| p.with_protocol(protocol)),
        }
    }
}

/// Context handed to builders as the chain builds depth-first
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext {
    /// Pseudo-header material from the enclosing IP builder, when any
    pub pseudo: Option<PseudoHeader>,
}

impl BuildContext {
    /// Context carrying pseudo-header material for transport builders
    pub fn with_pseudo(pseudo: PseudoHeader) -> Self {
        BuildContext {
            pseudo: Some(pseudo),
        }
    }

    /// Same addresses, different protocol number
    pub fn for_next_protocol(&self, protocol: u8) -> Self {
        BuildContext {
            pseudo: self.pseudo.map(|p| p.with_protocol(protocol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_header_protocol_rewrite() {
        let pseudo = PseudoHeader::V6 {
            src: "2001:db8::1".parse().unwrap(),
            dst: "2001:db8::2".parse().unwrap(),
            next_header: 0, // hop-by-hop
        };
        assert_eq!(pseudo.protocol(), 0);
        assert_eq!(pseudo.with_protocol(6).protocol(), 6);
    }

    #[test]
    fn test_verify_round_trip() {
        let pseudo = PseudoHeader::V4 {
            src: Ipv4Addr::new(192, 0, 2, 1),
            dst: Ipv4Addr::new(192, 0, 2, 2),
            protocol: 17,
        };
        let mut datagram = vec![0x00, 0x35, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
        let checksum = pseudo.checksum(&datagram);
        datagram[6..8].copy_from_slice(&checksum.to_be_bytes());
        assert!(pseudo.verify(&datagram));
    }
}
