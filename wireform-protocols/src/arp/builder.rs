//! ARP packet builder

use std::net::Ipv4Addr;

use bytes::Bytes;
use wireform_core::{Error, MacAddr, Result};

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::ethernet::EtherType;
use crate::node::{Header, Node};

use super::packet::{ArpHardwareType, ArpHeader, ArpOperation};

/// Builder for ARP packets
///
/// Operation and all four addresses are required. Hardware and protocol
/// types default to Ethernet/IPv4; address lengths are fixed at 6/4.
#[derive(Debug, Clone)]
pub struct ArpBuilder {
    hardware_type: ArpHardwareType,
    protocol_type: EtherType,
    operation: Option<ArpOperation>,
    src_hw_addr: Option<MacAddr>,
    src_proto_addr: Option<Ipv4Addr>,
    dst_hw_addr: Option<MacAddr>,
    dst_proto_addr: Option<Ipv4Addr>,
}

impl ArpBuilder {
    pub fn new() -> Self {
        ArpBuilder {
            hardware_type: ArpHardwareType::Ethernet,
            protocol_type: EtherType::Ipv4,
            operation: None,
            src_hw_addr: None,
            src_proto_addr: None,
            dst_hw_addr: None,
            dst_proto_addr: None,
        }
    }

    /// An ARP request asking who holds `dst_proto_addr`
    pub fn request(src_hw: MacAddr, src_proto: Ipv4Addr, dst_proto: Ipv4Addr) -> Self {
        ArpBuilder::new()
            .with_operation(ArpOperation::Request)
            .with_src_hw_addr(src_hw)
            .with_src_proto_addr(src_proto)
            .with_dst_hw_addr(MacAddr::zero())
            .with_dst_proto_addr(dst_proto)
    }

    /// An ARP reply announcing `src_proto` is at `src_hw`
    pub fn reply(
        src_hw: MacAddr,
        src_proto: Ipv4Addr,
        dst_hw: MacAddr,
        dst_proto: Ipv4Addr,
    ) -> Self {
        ArpBuilder::new()
            .with_operation(ArpOperation::Reply)
            .with_src_hw_addr(src_hw)
            .with_src_proto_addr(src_proto)
            .with_dst_hw_addr(dst_hw)
            .with_dst_proto_addr(dst_proto)
    }

    pub fn with_hardware_type(mut self, hardware_type: ArpHardwareType) -> Self {
        self.hardware_type = hardware_type;
        self
    }

    pub fn with_protocol_type(mut self, protocol_type: EtherType) -> Self {
        self.protocol_type = protocol_type;
        self
    }

    pub fn with_operation(mut self, operation: ArpOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_src_hw_addr(mut self, addr: MacAddr) -> Self {
        self.src_hw_addr = Some(addr);
        self
    }

    pub fn with_src_proto_addr(mut self, addr: Ipv4Addr) -> Self {
        self.src_proto_addr = Some(addr);
        self
    }

    pub fn with_dst_hw_addr(mut self, addr: MacAddr) -> Self {
        self.dst_hw_addr = Some(addr);
        self
    }

    pub fn with_dst_proto_addr(mut self, addr: Ipv4Addr) -> Self {
        self.dst_proto_addr = Some(addr);
        self
    }

    /// The EtherType an enclosing frame should carry for this packet
    pub(crate) fn ether_type_hint(&self) -> EtherType {
        match self.operation {
            Some(ArpOperation::RequestReverse) | Some(ArpOperation::ReplyReverse) => {
                EtherType::Rarp
            }
            _ => EtherType::Arp,
        }
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, _ctx: &BuildContext) -> Result<Node> {
        let operation = self
            .operation
            .ok_or_else(|| Error::missing_field("ARP", "operation"))?;
        let src_hw_addr = self
            .src_hw_addr
            .ok_or_else(|| Error::missing_field("ARP", "src_hw_addr"))?;
        let src_proto_addr = self
            .src_proto_addr
            .ok_or_else(|| Error::missing_field("ARP", "src_proto_addr"))?;
        let dst_hw_addr = self
            .dst_hw_addr
            .ok_or_else(|| Error::missing_field("ARP", "dst_hw_addr"))?;
        let dst_proto_addr = self
            .dst_proto_addr
            .ok_or_else(|| Error::missing_field("ARP", "dst_proto_addr"))?;

        Ok(Node::layer(
            Header::Arp(ArpHeader {
                hardware_type: self.hardware_type,
                protocol_type: self.protocol_type,
                hw_addr_len: 6,
                proto_addr_len: 4,
                operation,
                src_hw_addr,
                src_proto_addr,
                dst_hw_addr,
                dst_proto_addr,
            }),
            None,
            Bytes::new(),
        ))
    }
}

impl Default for ArpBuilder {
    fn default() -> Self {
        ArpBuilder::new()
    }
}

impl From<ArpBuilder> for Builder {
    fn from(b: ArpBuilder) -> Self {
        Builder::Arp(b)
    }
}
