//! ARP packet layout and parsing
//!
//! Only the Ethernet/IPv4 flavor (6-byte hardware, 4-byte protocol
//! addresses) is modeled, which fixes the layout at 28 octets. Frames
//! padded by the link layer keep the padding as the node's trailer.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{Error, MacAddr, Result};
use wireform_packet::field;

use crate::context::DecodeContext;
use crate::ethernet::EtherType;
use crate::node::{Header, Node};
use crate::registry::Registry;

use super::builder::ArpBuilder;

/// Fixed ARP packet size for Ethernet/IPv4
pub const ARP_HEADER_SIZE: usize = 28;

/// ARP hardware types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArpHardwareType {
    /// Ethernet (1)
    Ethernet,
    /// Any other hardware type
    Other(u16),
}

impl ArpHardwareType {
    pub fn to_u16(self) -> u16 {
        match self {
            ArpHardwareType::Ethernet => 1,
            ArpHardwareType::Other(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => ArpHardwareType::Ethernet,
            val => ArpHardwareType::Other(val),
        }
    }
}

impl fmt::Display for ArpHardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArpHardwareType::Ethernet => write!(f, "Ethernet"),
            ArpHardwareType::Other(val) => write!(f, "hardware type {val}"),
        }
    }
}

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArpOperation {
    /// ARP request (1)
    Request,
    /// ARP reply (2)
    Reply,
    /// RARP request (3)
    RequestReverse,
    /// RARP reply (4)
    ReplyReverse,
    /// Any other operation code
    Other(u16),
}

impl ArpOperation {
    pub fn to_u16(self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::RequestReverse => 3,
            ArpOperation::ReplyReverse => 4,
            ArpOperation::Other(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            3 => ArpOperation::RequestReverse,
            4 => ArpOperation::ReplyReverse,
            val => ArpOperation::Other(val),
        }
    }
}

impl fmt::Display for ArpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArpOperation::Request => write!(f, "request"),
            ArpOperation::Reply => write!(f, "reply"),
            ArpOperation::RequestReverse => write!(f, "reverse request"),
            ArpOperation::ReplyReverse => write!(f, "reverse reply"),
            ArpOperation::Other(val) => write!(f, "operation {val}"),
        }
    }
}

/// ARP packet header (the whole packet; ARP carries no payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpHeader {
    /// Hardware type
    pub hardware_type: ArpHardwareType,
    /// Protocol type (an EtherType, IPv4 here)
    pub protocol_type: EtherType,
    /// Hardware address length (6 for MAC)
    pub hw_addr_len: u8,
    /// Protocol address length (4 for IPv4)
    pub proto_addr_len: u8,
    /// Operation
    pub operation: ArpOperation,
    /// Sender hardware address
    pub src_hw_addr: MacAddr,
    /// Sender protocol address
    pub src_proto_addr: Ipv4Addr,
    /// Target hardware address
    pub dst_hw_addr: MacAddr,
    /// Target protocol address
    pub dst_proto_addr: Ipv4Addr,
}

impl ArpHeader {
    pub(crate) fn read(data: &[u8]) -> Result<Self> {
        if data.len() < ARP_HEADER_SIZE {
            return Err(Error::truncated("ARP", ARP_HEADER_SIZE, data.len()));
        }
        let hw_addr_len = field::read_u8(data, 4, "ARP")?;
        let proto_addr_len = field::read_u8(data, 5, "ARP")?;
        if hw_addr_len != 6 || proto_addr_len != 4 {
            return Err(Error::inconsistent(
                "ARP",
                format!("unsupported address lengths {hw_addr_len}/{proto_addr_len}"),
            ));
        }
        Ok(ArpHeader {
            hardware_type: ArpHardwareType::from_u16(field::read_u16(data, 0, "ARP")?),
            protocol_type: EtherType::from_u16(field::read_u16(data, 2, "ARP")?),
            hw_addr_len,
            proto_addr_len,
            operation: ArpOperation::from_u16(field::read_u16(data, 6, "ARP")?),
            src_hw_addr: field::read_mac(data, 8, "ARP")?,
            src_proto_addr: field::read_ipv4(data, 14, "ARP")?,
            dst_hw_addr: field::read_mac(data, 18, "ARP")?,
            dst_proto_addr: field::read_ipv4(data, 24, "ARP")?,
        })
    }

    pub fn len(&self) -> usize {
        ARP_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.hardware_type.to_u16());
        buf.put_u16(self.protocol_type.to_u16());
        buf.put_u8(self.hw_addr_len);
        buf.put_u8(self.proto_addr_len);
        buf.put_u16(self.operation.to_u16());
        buf.put_slice(self.src_hw_addr.as_bytes());
        buf.put_slice(&self.src_proto_addr.octets());
        buf.put_slice(self.dst_hw_addr.as_bytes());
        buf.put_slice(&self.dst_proto_addr.octets());
    }

    /// A builder seeded from this header
    pub fn to_builder(&self) -> ArpBuilder {
        ArpBuilder::new()
            .with_hardware_type(self.hardware_type)
            .with_protocol_type(self.protocol_type)
            .with_operation(self.operation)
            .with_src_hw_addr(self.src_hw_addr)
            .with_src_proto_addr(self.src_proto_addr)
            .with_dst_hw_addr(self.dst_hw_addr)
            .with_dst_proto_addr(self.dst_proto_addr)
    }
}

/// Decode an ARP packet; link-layer padding becomes the trailer
pub fn decode(_registry: &Registry, data: &[u8], _ctx: &DecodeContext) -> Result<Node> {
    let header = ArpHeader::read(data)?;
    let trailer = Bytes::copy_from_slice(&data[ARP_HEADER_SIZE..]);
    Ok(Node::layer(Header::Arp(header), None, trailer))
}
