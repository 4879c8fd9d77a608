//! ICMPv6 message builder

use bytes::{Bytes, BytesMut};
use wireform_core::{Error, Result};

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::node::{ChecksumStatus, Header, Node};

use super::packet::{Icmpv6Body, Icmpv6Header, Icmpv6Type};

/// Builder for ICMPv6 messages
///
/// The message type is required. The checksum covers the IPv6
/// pseudo-header, so building a checksum-correcting message outside an
/// IPv6 layer is a precondition error.
#[derive(Debug, Clone)]
pub struct Icmpv6Builder {
    icmp_type: Option<Icmpv6Type>,
    code: u8,
    checksum: Option<u16>,
    body: Icmpv6Body,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) correct_checksum: bool,
}

impl Icmpv6Builder {
    pub fn new() -> Self {
        Icmpv6Builder {
            icmp_type: None,
            code: 0,
            checksum: None,
            body: Icmpv6Body::Rest { value: 0 },
            payload: None,
            correct_checksum: true,
        }
    }

    /// Seed a builder from a decoded header, keeping every stored field
    pub(crate) fn from_header(header: &Icmpv6Header) -> Self {
        Icmpv6Builder {
            icmp_type: Some(header.icmp_type),
            code: header.code,
            checksum: Some(header.checksum),
            body: header.body.clone(),
            payload: None,
            correct_checksum: true,
        }
    }

    /// An echo request with the given identifier and sequence number
    pub fn echo(identifier: u16, sequence: u16) -> Self {
        Icmpv6Builder::new()
            .with_icmp_type(Icmpv6Type::EchoRequest)
            .with_body(Icmpv6Body::Echo {
                identifier,
                sequence,
            })
    }

    /// A packet-too-big error advertising the constricting link's MTU
    pub fn packet_too_big(mtu: u32) -> Self {
        Icmpv6Builder::new()
            .with_icmp_type(Icmpv6Type::PacketTooBig)
            .with_body(Icmpv6Body::PacketTooBig { mtu })
    }

    pub fn with_icmp_type(mut self, icmp_type: Icmpv6Type) -> Self {
        self.icmp_type = Some(icmp_type);
        self
    }

    pub fn with_code(mut self, code: u8) -> Self {
        self.code = code;
        self
    }

    /// Store an explicit checksum, used when checksum correction is off
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Set the type-specific field
    pub fn with_body(mut self, body: Icmpv6Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Derive the checksum from the pseudo-header and message (default
    /// true)
    pub fn with_correct_checksum(mut self, correct: bool) -> Self {
        self.correct_checksum = correct;
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, ctx: &BuildContext) -> Result<Node> {
        let icmp_type = self
            .icmp_type
            .ok_or_else(|| Error::missing_field("ICMPv6", "icmp_type"))?;

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&BuildContext::default())?),
            None => None,
        };

        let mut header = Icmpv6Header {
            icmp_type,
            code: self.code,
            checksum: self.checksum.unwrap_or(0),
            body: self.body.clone(),
            checksum_status: ChecksumStatus::Unverified,
        };

        if self.correct_checksum {
            let pseudo = ctx
                .pseudo
                .ok_or_else(|| Error::missing_field("ICMPv6", "enclosing IP addresses"))?;
            header.checksum = 0;
            let mut message =
                BytesMut::with_capacity(header.len() + payload.as_ref().map_or(0, |p| p.len()));
            header.write(&mut message);
            if let Some(payload) = &payload {
                message.extend_from_slice(&payload.raw_octets());
            }
            header.checksum = pseudo.checksum(&message);
        }

        Ok(Node::layer(Header::Icmpv6(header), payload, Bytes::new()))
    }
}

impl Default for Icmpv6Builder {
    fn default() -> Self {
        Icmpv6Builder::new()
    }
}

impl From<Icmpv6Builder> for Builder {
    fn from(b: Icmpv6Builder) -> Self {
        Builder::Icmpv6(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RawBuilder;
    use crate::context::PseudoHeader;
    use std::net::Ipv6Addr;

    fn pseudo() -> PseudoHeader {
        PseudoHeader::V6 {
            src: "2001:db8::1".parse::<Ipv6Addr>().unwrap(),
            dst: "2001:db8::2".parse::<Ipv6Addr>().unwrap(),
            next_header: 58,
        }
    }

    #[test]
    fn test_echo_builds_verifiable_message() {
        let node = Icmpv6Builder::echo(7, 1)
            .with_payload(RawBuilder::new(b"ping6".to_vec()))
            .build_in(&BuildContext::with_pseudo(pseudo()))
            .unwrap();

        assert_eq!(node.len(), 13);
        assert!(pseudo().verify(&node.raw_octets()));
    }

    #[test]
    fn test_checksum_correction_requires_context() {
        let err = Icmpv6Builder::echo(1, 1)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert_eq!(err, Error::missing_field("ICMPv6", "enclosing IP addresses"));
    }

    #[test]
    fn test_missing_type_fails() {
        let err = Icmpv6Builder::new().build_in(&BuildContext::default()).unwrap_err();
        assert_eq!(err, Error::missing_field("ICMPv6", "icmp_type"));
    }
}
