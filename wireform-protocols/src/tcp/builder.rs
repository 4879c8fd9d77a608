//! TCP segment builder

use bytes::{Bytes, BytesMut};
use wireform_core::{Error, Result};

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::node::{ChecksumStatus, Header, Node};

use super::options::{self, TcpOption};
use super::packet::{TcpFlags, TcpHeader, TcpPort, TCP_MAX_HEADER_SIZE, TCP_MIN_HEADER_SIZE};

/// Builder for TCP segments
///
/// Both ports are required. With length correction enabled (the
/// default) the data offset is derived from the encoded options; with
/// checksum correction enabled the checksum is computed over the
/// pseudo-header supplied by the enclosing IP builder — building a
/// checksum-correcting segment outside an IP layer is a precondition
/// error.
#[derive(Debug, Clone)]
pub struct TcpBuilder {
    src_port: Option<TcpPort>,
    dst_port: Option<TcpPort>,
    sequence: u32,
    acknowledgment: u32,
    data_offset: Option<u8>,
    reserved: u8,
    flags: TcpFlags,
    window: u16,
    checksum: Option<u16>,
    urgent_pointer: u16,
    options: Vec<TcpOption>,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) correct_length: bool,
    pub(crate) correct_checksum: bool,
}

impl TcpBuilder {
    pub fn new() -> Self {
        TcpBuilder {
            src_port: None,
            dst_port: None,
            sequence: 0,
            acknowledgment: 0,
            data_offset: None,
            reserved: 0,
            flags: TcpFlags::NONE,
            window: 65535,
            checksum: None,
            urgent_pointer: 0,
            options: Vec::new(),
            payload: None,
            correct_length: true,
            correct_checksum: true,
        }
    }

    /// Seed a builder from a decoded header, keeping every stored field
    pub(crate) fn from_header(header: &TcpHeader) -> Self {
        TcpBuilder {
            src_port: Some(header.src_port),
            dst_port: Some(header.dst_port),
            sequence: header.sequence,
            acknowledgment: header.acknowledgment,
            data_offset: Some(header.data_offset),
            reserved: header.reserved,
            flags: header.flags,
            window: header.window,
            checksum: Some(header.checksum),
            urgent_pointer: header.urgent_pointer,
            options: header.options.clone(),
            payload: None,
            correct_length: true,
            correct_checksum: true,
        }
    }

    pub fn with_src_port(mut self, port: TcpPort) -> Self {
        self.src_port = Some(port);
        self
    }

    pub fn with_dst_port(mut self, port: TcpPort) -> Self {
        self.dst_port = Some(port);
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_acknowledgment(mut self, acknowledgment: u32) -> Self {
        self.acknowledgment = acknowledgment;
        self
    }

    /// Store an explicit data offset, used when length correction is off
    pub fn with_data_offset(mut self, data_offset: u8) -> Self {
        self.data_offset = Some(data_offset);
        self
    }

    pub fn with_flags(mut self, flags: TcpFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    /// Store an explicit checksum, used when checksum correction is off
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_urgent_pointer(mut self, urgent_pointer: u16) -> Self {
        self.urgent_pointer = urgent_pointer;
        self
    }

    /// Append a header option
    pub fn with_option(mut self, option: TcpOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Derive the data offset from the encoded options (default true)
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
            .ok_or_else(|| Error::missing_field("TCP", "src_port"))?;
        let dst_port = self
            .dst_port
            .ok_or_else(|| Error::missing_field("TCP", "dst_port"))?;

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&BuildContext::default())?),
            None => None,
        };

        let options_len = options::wire_len(&self.options);
        let padding_len = (4 - options_len % 4) % 4;
        let options_padding = Bytes::from(vec![0u8; padding_len]);
        let header_len = TCP_MIN_HEADER_SIZE + options_len + padding_len;
        if header_len > TCP_MAX_HEADER_SIZE {
            return Err(Error::field_overflow(
                "TCP",
                "options",
                format!("header length {header_len} exceeds {TCP_MAX_HEADER_SIZE}"),
            ));
        }

        let data_offset = if self.correct_length {
            (header_len / 4) as u8
        } else {
            self.data_offset.unwrap_or((header_len / 4) as u8)
        };

        let mut header = TcpHeader {
            src_port,
            dst_port,
            sequence: self.sequence,
            acknowledgment: self.acknowledgment,
            data_offset,
            reserved: self.reserved,
            flags: self.flags,
            window: self.window,
            checksum: self.checksum.unwrap_or(0),
            urgent_pointer: self.urgent_pointer,
            options: self.options.clone(),
            options_padding,
            checksum_status: ChecksumStatus::Unverified,
        };

        if self.correct_checksum {
            let pseudo = ctx
                .pseudo
                .ok_or_else(|| Error::missing_field("TCP", "enclosing IP addresses"))?;
            header.checksum = 0;
            let mut segment = BytesMut::with_capacity(
                header.len() + payload.as_ref().map_or(0, |p| p.len()),
            );
            header.write(&mut segment);
            if let Some(payload) = &payload {
                segment.extend_from_slice(&payload.raw_octets());
            }
            header.checksum = pseudo.checksum(&segment);
        }

        Ok(Node::layer(Header::Tcp(header), payload, Bytes::new()))
    }
}

impl Default for TcpBuilder {
    fn default() -> Self {
        TcpBuilder::new()
    }
}

impl From<TcpBuilder> for Builder {
    fn from(b: TcpBuilder) -> Self {
        Builder::Tcp(b)
    }
}
