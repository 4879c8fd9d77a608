//! TCP segment layout and parsing

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{config, Error, Result};
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::node::{ChecksumStatus, Header, Node};
use crate::registry::Registry;

use super::builder::TcpBuilder;
use super::options::{self, TcpOption};

/// Minimum TCP header size (data offset 5)
pub const TCP_MIN_HEADER_SIZE: usize = 20;

/// Maximum TCP header size (data offset 15)
pub const TCP_MAX_HEADER_SIZE: usize = 60;

/// A TCP port number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpPort(pub u16);

impl TcpPort {
    /// SSH (22)
    pub const SSH: TcpPort = TcpPort(22);
    /// SMTP (25)
    pub const SMTP: TcpPort = TcpPort(25);
    /// HTTP (80)
    pub const HTTP: TcpPort = TcpPort(80);
    /// HTTPS (443)
    pub const HTTPS: TcpPort = TcpPort(443);

    pub fn new(port: u16) -> Self {
        TcpPort(port)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TcpPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for TcpPort {
    fn from(port: u16) -> Self {
        TcpPort(port)
    }
}

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - no more data from sender
    pub fin: bool,
    /// SYN - synchronize sequence numbers
    pub syn: bool,
    /// RST - reset the connection
    pub rst: bool,
    /// PSH - push function
    pub psh: bool,
    /// ACK - acknowledgment field is significant
    pub ack: bool,
    /// URG - urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN echo
    pub ece: bool,
    /// CWR - congestion window reduced
    pub cwr: bool,
}

impl TcpFlags {
    /// No flags set
    pub const NONE: TcpFlags = TcpFlags {
        fin: false,
        syn: false,
        rst: false,
        psh: false,
        ack: false,
        urg: false,
        ece: false,
        cwr: false,
    };

    /// SYN only
    pub const SYN: TcpFlags = TcpFlags {
        syn: true,
        ..TcpFlags::NONE
    };

    /// SYN + ACK
    pub const SYN_ACK: TcpFlags = TcpFlags {
        syn: true,
        ack: true,
        ..TcpFlags::NONE
    };

    /// ACK only
    pub const ACK: TcpFlags = TcpFlags {
        ack: true,
        ..TcpFlags::NONE
    };

    /// FIN + ACK
    pub const FIN_ACK: TcpFlags = TcpFlags {
        fin: true,
        ack: true,
        ..TcpFlags::NONE
    };

    /// RST only
    pub const RST: TcpFlags = TcpFlags {
        rst: true,
        ..TcpFlags::NONE
    };

    /// Convert to the wire octet
    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.fin {
            flags |= 0x01;
        }
        if self.syn {
            flags |= 0x02;
        }
        if self.rst {
            flags |= 0x04;
        }
        if self.psh {
            flags |= 0x08;
        }
        if self.ack {
            flags |= 0x10;
        }
        if self.urg {
            flags |= 0x20;
        }
        if self.ece {
            flags |= 0x40;
        }
        if self.cwr {
            flags |= 0x80;
        }
        flags
    }

    /// Parse from the wire octet
    pub fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: value & 0x01 != 0,
            syn: value & 0x02 != 0,
            rst: value & 0x04 != 0,
            psh: value & 0x08 != 0,
            ack: value & 0x10 != 0,
            urg: value & 0x20 != 0,
            ece: value & 0x40 != 0,
            cwr: value & 0x80 != 0,
        }
    }
}

/// TCP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    /// Source port
    pub src_port: TcpPort,
    /// Destination port
    pub dst_port: TcpPort,
    /// Sequence number
    pub sequence: u32,
    /// Acknowledgment number
    pub acknowledgment: u32,
    /// Header length in 32-bit words (4 bits)
    pub data_offset: u8,
    /// Reserved bits between the offset and the flags (4 bits)
    pub reserved: u8,
    /// Flags
    pub flags: TcpFlags,
    /// Window size
    pub window: u16,
    /// Checksum over the pseudo-header, header, and payload
    pub checksum: u16,
    /// Urgent pointer
    pub urgent_pointer: u16,
    /// Options
    pub options: Vec<TcpOption>,
    /// Padding after the options, up to the data-offset boundary
    pub options_padding: Bytes,
    /// Decode-time checksum verification outcome
    pub checksum_status: ChecksumStatus,
}

impl TcpHeader {
    /// The header's serialized length
    pub fn len(&self) -> usize {
        TCP_MIN_HEADER_SIZE + options::wire_len(&self.options) + self.options_padding.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.src_port.to_u16());
        buf.put_u16(self.dst_port.to_u16());
        buf.put_u32(self.sequence);
        buf.put_u32(self.acknowledgment);
        buf.put_u8((self.data_offset << 4) | (self.reserved & 0x0f));
        buf.put_u8(self.flags.to_u8());
        buf.put_u16(self.window);
        buf.put_u16(self.checksum);
        buf.put_u16(self.urgent_pointer);
        for option in &self.options {
            option.write(buf);
        }
        buf.put_slice(&self.options_padding);
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.data_offset as usize * 4 == self.len() && self.checksum_status.passes()
    }

    /// A builder seeded from this header's fields, verbatim
    pub fn to_builder(&self) -> TcpBuilder {
        TcpBuilder::from_header(self)
    }
}

/// Decode a TCP segment
///
/// The checksum is verified against the enclosing IP layer's
/// pseudo-header when the context carries one and verification is
/// enabled; a segment decoded without IP context stays unverified.
/// Application bytes after the header are dispatched by port.
pub fn decode(registry: &Registry, data: &[u8], ctx: &DecodeContext) -> Result<Node> {
    if data.len() < TCP_MIN_HEADER_SIZE {
        return Err(Error::truncated("TCP", TCP_MIN_HEADER_SIZE, data.len()));
    }

    let offset_byte = field::read_u8(data, 12, "TCP")?;
    let data_offset = offset_byte >> 4;
    if data_offset < 5 {
        return Err(Error::inconsistent(
            "TCP",
            format!("data offset {data_offset} below 5"),
        ));
    }
    let header_len = data_offset as usize * 4;
    if data.len() < header_len {
        return Err(Error::inconsistent(
            "TCP",
            format!(
                "data offset {data_offset} declares {header_len} header bytes, {} available",
                data.len()
            ),
        ));
    }

    let (parsed_options, options_padding) = options::parse(&data[TCP_MIN_HEADER_SIZE..header_len])?;

    let checksum_status = match ctx.pseudo {
        Some(pseudo) if config::global().verify_tcp_checksum => {
            if pseudo.verify(data) {
                ChecksumStatus::Valid
            } else {
                ChecksumStatus::Invalid
            }
        }
        _ => ChecksumStatus::Unverified,
    };

    let header = TcpHeader {
        src_port: TcpPort::new(field::read_u16(data, 0, "TCP")?),
        dst_port: TcpPort::new(field::read_u16(data, 2, "TCP")?),
        sequence: field::read_u32(data, 4, "TCP")?,
        acknowledgment: field::read_u32(data, 8, "TCP")?,
        data_offset,
        reserved: offset_byte & 0x0f,
        flags: TcpFlags::from_u8(field::read_u8(data, 13, "TCP")?),
        window: field::read_u16(data, 14, "TCP")?,
        checksum: field::read_u16(data, 16, "TCP")?,
        urgent_pointer: field::read_u16(data, 18, "TCP")?,
        options: parsed_options,
        options_padding,
        checksum_status,
    };

    let rest = &data[header_len..];
    let payload = if rest.is_empty() {
        None
    } else {
        Some(registry.decode_tcp_ports(header.src_port, header.dst_port, rest, ctx))
    };

    Ok(Node::layer(Header::Tcp(header), payload, Bytes::new()))
}
