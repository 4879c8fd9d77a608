//! IPv4 packet builder

use std::net::Ipv4Addr;

use bytes::{Bytes, BytesMut};
use wireform_core::{Error, Result};
use wireform_packet::checksum::internet_checksum;

use crate::builder::Builder;
use crate::context::{BuildContext, PseudoHeader};
use crate::ip_number::IpNumber;
use crate::node::{Header, Node};

use super::options::{self, Ipv4Option};
use super::packet::{Ipv4Flags, Ipv4Header, IPV4_MAX_HEADER_SIZE, IPV4_MIN_HEADER_SIZE};

/// Builder for IPv4 packets
///
/// Source and destination addresses are required; the protocol number
/// is derived from the payload builder when not set explicitly. With
/// length correction enabled (the default) the IHL and total length are
/// computed from the encoded options and the built payload; with
/// checksum correction enabled the header checksum is computed over the
/// final header octets. Disabling either serializes the stored values
/// verbatim, which is how deliberately malformed packets are made.
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    ihl: Option<u8>,
    tos: u8,
    total_length: Option<u16>,
    identification: u16,
    flags: Ipv4Flags,
    fragment_offset: u16,
    ttl: u8,
    protocol: Option<IpNumber>,
    checksum: Option<u16>,
    src_addr: Option<Ipv4Addr>,
    dst_addr: Option<Ipv4Addr>,
    options: Vec<Ipv4Option>,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) correct_length: bool,
    pub(crate) correct_checksum: bool,
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Ipv4Builder {
            ihl: None,
            tos: 0,
            total_length: None,
            identification: 0,
            flags: Ipv4Flags::DONT_FRAGMENT,
            fragment_offset: 0,
            ttl: 64,
            protocol: None,
            checksum: None,
            src_addr: None,
            dst_addr: None,
            options: Vec::new(),
            payload: None,
            correct_length: true,
            correct_checksum: true,
        }
    }

    /// Seed a builder from a decoded header, keeping every stored field
    pub(crate) fn from_header(header: &Ipv4Header) -> Self {
        Ipv4Builder {
            ihl: Some(header.ihl),
            tos: header.tos,
            total_length: Some(header.total_length),
            identification: header.identification,
            flags: header.flags,
            fragment_offset: header.fragment_offset,
            ttl: header.ttl,
            protocol: Some(header.protocol),
            checksum: Some(header.checksum),
            src_addr: Some(header.src_addr),
            dst_addr: Some(header.dst_addr),
            options: header.options.clone(),
            payload: None,
            correct_length: true,
            correct_checksum: true,
        }
    }

    pub fn with_tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    /// Store an explicit total length, used when length correction is off
    pub fn with_total_length(mut self, total_length: u16) -> Self {
        self.total_length = Some(total_length);
        self
    }

    /// Store an explicit IHL, used when length correction is off
    pub fn with_ihl(mut self, ihl: u8) -> Self {
        self.ihl = Some(ihl);
        self
    }

    pub fn with_identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    pub fn with_flags(mut self, flags: Ipv4Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the fragment offset in 8-byte units (13 bits)
    pub fn with_fragment_offset(mut self, offset: u16) -> Self {
        self.fragment_offset = offset;
        self
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the payload protocol explicitly instead of deriving it from
    /// the payload builder
    pub fn with_protocol(mut self, protocol: IpNumber) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Store an explicit checksum, used when checksum correction is off
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_src_addr(mut self, addr: Ipv4Addr) -> Self {
        self.src_addr = Some(addr);
        self
    }

    pub fn with_dst_addr(mut self, addr: Ipv4Addr) -> Self {
        self.dst_addr = Some(addr);
        self
    }

    /// Append a header option
    pub fn with_option(mut self, option: Ipv4Option) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Derive IHL and total length from options and payload (default
    /// true)
    pub fn with_correct_length(mut self, correct: bool) -> Self {
        self.correct_length = correct;
        self
    }

    /// Derive the header checksum from the final header octets (default
    /// true)
    pub fn with_correct_checksum(mut self, correct: bool) -> Self {
        self.correct_checksum = correct;
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, _ctx: &BuildContext) -> Result<Node> {
        let src_addr = self
            .src_addr
            .ok_or_else(|| Error::missing_field("IPv4", "src_addr"))?;
        let dst_addr = self
            .dst_addr
            .ok_or_else(|| Error::missing_field("IPv4", "dst_addr"))?;
        let protocol = self
            .protocol
            .or_else(|| self.payload.as_deref().and_then(|p| p.ip_number_hint()))
            .ok_or_else(|| Error::missing_field("IPv4", "protocol"))?;

        if self.fragment_offset > 0x1fff {
            return Err(Error::field_overflow(
                "IPv4",
                "fragment_offset",
                format!("{} exceeds 13 bits", self.fragment_offset),
            ));
        }

        let ctx = BuildContext::with_pseudo(PseudoHeader::V4 {
            src: src_addr,
            dst: dst_addr,
            protocol: protocol.to_u8(),
        });
        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&ctx)?),
            None => None,
        };
        let payload_len = payload.as_ref().map_or(0, |p| p.len());

        let options_len = options::wire_len(&self.options);
        let padding_len = (4 - options_len % 4) % 4;
        let options_padding = Bytes::from(vec![0u8; padding_len]);
        let header_len = IPV4_MIN_HEADER_SIZE + options_len + padding_len;
        if header_len > IPV4_MAX_HEADER_SIZE {
            return Err(Error::field_overflow(
                "IPv4",
                "options",
                format!("header length {header_len} exceeds {IPV4_MAX_HEADER_SIZE}"),
            ));
        }

        let derived_total = header_len + payload_len;
        if derived_total > u16::MAX as usize {
            return Err(Error::field_overflow(
                "IPv4",
                "total_length",
                format!("{derived_total} exceeds 16 bits"),
            ));
        }

        let ihl = if self.correct_length {
            (header_len / 4) as u8
        } else {
            self.ihl.unwrap_or((header_len / 4) as u8)
        };
        let total_length = if self.correct_length {
            derived_total as u16
        } else {
            self.total_length.unwrap_or(derived_total as u16)
        };

        let mut header = Ipv4Header {
            version: 4,
            ihl,
            tos: self.tos,
            total_length,
            identification: self.identification,
            flags: self.flags,
            fragment_offset: self.fragment_offset,
            ttl: self.ttl,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
            options: self.options.clone(),
            options_padding,
        };

        header.checksum = if self.correct_checksum {
            let mut buf = BytesMut::with_capacity(header.len());
            header.write(&mut buf);
            internet_checksum(&buf)
        } else {
            self.checksum.unwrap_or(0)
        };

        Ok(Node::layer(Header::Ipv4(header), payload, Bytes::new()))
    }
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Ipv4Builder::new()
    }
}

impl From<Ipv4Builder> for Builder {
    fn from(b: Ipv4Builder) -> Self {
        Builder::Ipv4(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RawBuilder;

    fn addrs() -> (Ipv4Addr, Ipv4Addr) {
        (Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2))
    }

    #[test]
    fn test_build_derives_length_and_checksum() {
        let (src, dst) = addrs();
        let node = Ipv4Builder::new()
            .with_src_addr(src)
            .with_dst_addr(dst)
            .with_protocol(IpNumber::Other(253))
            .with_payload(RawBuilder::new(vec![1u8, 2, 3, 4]))
            .build_in(&BuildContext::default())
            .unwrap();

        let header = node.header().unwrap().as_ipv4().unwrap();
        assert_eq!(header.ihl, 5);
        assert_eq!(header.total_length, 24);
        assert!(header.has_valid_checksum());
        assert!(node.is_valid());
        assert_eq!(node.len(), 24);
    }

    #[test]
    fn test_build_without_corrections_keeps_stored_values() {
        let (src, dst) = addrs();
        let node = Ipv4Builder::new()
            .with_src_addr(src)
            .with_dst_addr(dst)
            .with_protocol(IpNumber::Udp)
            .with_total_length(999)
            .with_checksum(0xdead)
            .with_correct_length(false)
            .with_correct_checksum(false)
            .with_payload(RawBuilder::new(vec![0u8; 4]))
            .build_in(&BuildContext::default())
            .unwrap();

        let header = node.header().unwrap().as_ipv4().unwrap();
        assert_eq!(header.total_length, 999);
        assert_eq!(header.checksum, 0xdead);
        assert!(!node.is_valid());
    }

    #[test]
    fn test_options_are_padded_to_word_boundary() {
        let (src, dst) = addrs();
        let node = Ipv4Builder::new()
            .with_src_addr(src)
            .with_dst_addr(dst)
            .with_protocol(IpNumber::Udp)
            .with_option(Ipv4Option::NoOperation)
            .build_in(&BuildContext::default())
            .unwrap();

        let header = node.header().unwrap().as_ipv4().unwrap();
        assert_eq!(header.ihl, 6);
        assert_eq!(header.len(), 24);
        assert_eq!(header.options_padding.len(), 3);
        assert!(node.is_valid());
    }

    #[test]
    fn test_missing_addr_fails() {
        let err = Ipv4Builder::new()
            .with_dst_addr(addrs().1)
            .with_protocol(IpNumber::Udp)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert_eq!(err, Error::missing_field("IPv4", "src_addr"));
    }

    #[test]
    fn test_missing_protocol_fails_for_raw_payload() {
        let (src, dst) = addrs();
        let err = Ipv4Builder::new()
            .with_src_addr(src)
            .with_dst_addr(dst)
            .with_payload(RawBuilder::new(vec![1u8]))
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert_eq!(err, Error::missing_field("IPv4", "protocol"));
    }

    #[test]
    fn test_fragment_offset_overflow_rejected() {
        let (src, dst) = addrs();
        let err = Ipv4Builder::new()
            .with_src_addr(src)
            .with_dst_addr(dst)
            .with_protocol(IpNumber::Udp)
            .with_fragment_offset(0x2000)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FieldOverflow { field: "fragment_offset", .. }
        ));
    }
}
