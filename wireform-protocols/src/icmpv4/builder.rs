//! ICMPv4 message builder

use bytes::{Bytes, BytesMut};
use wireform_core::{Error, Result};
use wireform_packet::checksum::internet_checksum;

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::node::{ChecksumStatus, Header, Node};

use super::packet::{Icmpv4Body, Icmpv4Header, Icmpv4Type};

/// Builder for ICMPv4 messages
///
/// The message type is required. With checksum correction enabled (the
/// default) the checksum is computed over the whole message after the
/// payload is built; no pseudo-header is involved.
#[derive(Debug, Clone)]
pub struct Icmpv4Builder {
    icmp_type: Option<Icmpv4Type>,
    code: u8,
    checksum: Option<u16>,
    body: Icmpv4Body,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) correct_checksum: bool,
}

impl Icmpv4Builder {
    pub fn new() -> Self {
        Icmpv4Builder {
            icmp_type: None,
            code: 0,
            checksum: None,
            body: Icmpv4Body::Rest { value: 0 },
            payload: None,
            correct_checksum: true,
        }
    }

    /// Seed a builder from a decoded header, keeping every stored field
    pub(crate) fn from_header(header: &Icmpv4Header) -> Self {
        Icmpv4Builder {
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
        Icmpv4Builder::new()
            .with_icmp_type(Icmpv4Type::Echo)
            .with_body(Icmpv4Body::Echo {
                identifier,
                sequence,
            })
    }

    /// An echo reply with the given identifier and sequence number
    pub fn echo_reply(identifier: u16, sequence: u16) -> Self {
        Icmpv4Builder::new()
            .with_icmp_type(Icmpv4Type::EchoReply)
            .with_body(Icmpv4Body::Echo {
                identifier,
                sequence,
            })
    }

    /// A destination-unreachable error; attach the invoking packet via
    /// [`crate::icmp_common::invoking_packet`]
    pub fn destination_unreachable(code: u8) -> Self {
        Icmpv4Builder::new()
            .with_icmp_type(Icmpv4Type::DestinationUnreachable)
            .with_code(code)
    }

    /// A time-exceeded error
    pub fn time_exceeded(code: u8) -> Self {
        Icmpv4Builder::new()
            .with_icmp_type(Icmpv4Type::TimeExceeded)
            .with_code(code)
    }

    pub fn with_icmp_type(mut self, icmp_type: Icmpv4Type) -> Self {
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

    /// Set the type-specific field(s)
    pub fn with_body(mut self, body: Icmpv4Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Derive the checksum from the whole message (default true)
    pub fn with_correct_checksum(mut self, correct: bool) -> Self {
        self.correct_checksum = correct;
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, _ctx: &BuildContext) -> Result<Node> {
        let icmp_type = self
            .icmp_type
            .ok_or_else(|| Error::missing_field("ICMPv4", "icmp_type"))?;

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&BuildContext::default())?),
            None => None,
        };

        let mut header = Icmpv4Header {
            icmp_type,
            code: self.code,
            checksum: self.checksum.unwrap_or(0),
            body: self.body.clone(),
            checksum_status: ChecksumStatus::Unverified,
        };

        if self.correct_checksum {
            header.checksum = 0;
            let mut message =
                BytesMut::with_capacity(header.len() + payload.as_ref().map_or(0, |p| p.len()));
            header.write(&mut message);
            if let Some(payload) = &payload {
                message.extend_from_slice(&payload.raw_octets());
            }
            header.checksum = internet_checksum(&message);
        }

        Ok(Node::layer(Header::Icmpv4(header), payload, Bytes::new()))
    }
}

impl Default for Icmpv4Builder {
    fn default() -> Self {
        Icmpv4Builder::new()
    }
}

impl From<Icmpv4Builder> for Builder {
    fn from(b: Icmpv4Builder) -> Self {
        Builder::Icmpv4(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RawBuilder;
    use wireform_packet::verify_checksum;

    #[test]
    fn test_echo_builds_verifiable_message() {
        let node = Icmpv4Builder::echo(0x1234, 7)
            .with_payload(RawBuilder::new(b"ping".to_vec()))
            .build_in(&BuildContext::default())
            .unwrap();

        assert_eq!(node.len(), 12);
        assert!(verify_checksum(&node.raw_octets()));
        let header = node.header().unwrap().as_icmpv4().unwrap();
        assert_eq!(header.icmp_type, Icmpv4Type::Echo);
    }

    #[test]
    fn test_missing_type_fails() {
        let err = Icmpv4Builder::new().build_in(&BuildContext::default()).unwrap_err();
        assert_eq!(err, Error::missing_field("ICMPv4", "icmp_type"));
    }

    #[test]
    fn test_explicit_wrong_checksum_kept() {
        let node = Icmpv4Builder::echo(1, 1)
            .with_checksum(0x0bad)
            .with_correct_checksum(false)
            .build_in(&BuildContext::default())
            .unwrap();
        let header = node.header().unwrap().as_icmpv4().unwrap();
        assert_eq!(header.checksum, 0x0bad);
        assert!(!verify_checksum(&node.raw_octets()));
    }
}
