//! UDP datagram builder

use bytes::{Bytes, BytesMut};
use wireform_core::{Error, Result};

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::node::{ChecksumStatus, Header, Node};

use super::packet::{UdpHeader, UdpPort, UDP_HEADER_SIZE};

/// Builder for UDP datagrams
///
/// Both ports are required. With checksum correction enabled the
/// checksum is computed over the pseudo-header supplied by the
/// enclosing IP builder; a computed value of zero is transmitted as
/// 0xffff so the wire zero keeps its "no checksum" meaning. With
/// checksum correction disabled and no stored checksum, zero is
/// serialized, producing an unchecked datagram.
#[derive(Debug, Clone)]
pub struct UdpBuilder {
    src_port: Option<UdpPort>,
    dst_port: Option<UdpPort>,
    length: Option<u16>,
    checksum: Option<u16>,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) correct_length: bool,
    pub(crate) correct_checksum: bool,
}

impl UdpBuilder {
    pub fn new() -> Self {
        UdpBuilder {
            src_port: None,
            dst_port: None,
            length: None,
            checksum: None,
            payload: None,
            correct_length: true,
            correct_checksum: true,
        }
    }

    /// Seed a builder from a decoded header, keeping every stored field
    pub(crate) fn from_header(header: &UdpHeader) -> Self {
        UdpBuilder {
            src_port: Some(header.src_port),
            dst_port: Some(header.dst_port),
            length: Some(header.length),
            checksum: Some(header.checksum),
            payload: None,
            correct_length: true,
            correct_checksum: true,
        }
    }

    pub fn with_src_port(mut self, port: UdpPort) -> Self {
        self.src_port = Some(port);
        self
    }

    pub fn with_dst_port(mut self, port: UdpPort) -> Self {
        self.dst_port = Some(port);
        self
    }

    /// Store an explicit length, used when length correction is off
    pub fn with_length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    /// Store an explicit checksum, used when checksum correction is off
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Derive the length from the built payload (default true)
    pub fn with_correct_length(mut self, correct: bool) -> Self {
        self.correct_length = correct;
        self
    }

    /// Derive the checksum from the pseudo-header, header, and payload
    /// (default true)
    pub fn with_correct_checksum(mut self, correct: bool) -> Self {
        self.correct_checksum = correct;
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, ctx: &BuildContext) -> Result<Node> {
        let src_port = self
            .src_port
            .ok_or_else(|| Error::missing_field("UDP", "src_port"))?;
        let dst_port = self
            .dst_port
            .ok_or_else(|| Error::missing_field("UDP", "dst_port"))?;

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&BuildContext::default())?),
            None => None,
        };
        let payload_len = payload.as_ref().map_or(0, |p| p.len());

        let derived_length = UDP_HEADER_SIZE + payload_len;
        if derived_length > u16::MAX as usize {
            return Err(Error::field_overflow(
                "UDP",
                "length",
                format!("{derived_length} exceeds 16 bits"),
            ));
        }
        let length = if self.correct_length {
            derived_length as u16
        } else {
            self.length.unwrap_or(derived_length as u16)
        };

        let mut header = UdpHeader {
            src_port,
            dst_port,
            length,
            checksum: self.checksum.unwrap_or(0),
            checksum_status: ChecksumStatus::Unverified,
        };

        if self.correct_checksum {
            let pseudo = ctx
                .pseudo
                .ok_or_else(|| Error::missing_field("UDP", "enclosing IP addresses"))?;
            header.checksum = 0;
            let mut datagram = BytesMut::with_capacity(UDP_HEADER_SIZE + payload_len);
            header.write(&mut datagram);
            if let Some(payload) = &payload {
                datagram.extend_from_slice(&payload.raw_octets());
            }
            let computed = pseudo.checksum(&datagram);
            // Zero means "no checksum" on the wire; a computed zero is
            // transmitted as its one's-complement equivalent
            header.checksum = if computed == 0 { 0xffff } else { computed };
        }

        Ok(Node::layer(Header::Udp(header), payload, Bytes::new()))
    }
}

impl Default for UdpBuilder {
    fn default() -> Self {
        UdpBuilder::new()
    }
}

impl From<UdpBuilder> for Builder {
    fn from(b: UdpBuilder) -> Self {
        Builder::Udp(b)
    }
}
