//! Ethernet frame builder

use bytes::Bytes;
use wireform_core::{Error, MacAddr, Result};

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::node::{Header, Node};

use super::packet::{EtherType, EthernetHeader, ETHERNET_HEADER_SIZE, ETHERNET_MIN_FRAME_SIZE};

/// Builder for Ethernet frames
///
/// Destination and source addresses are required. The EtherType is
/// derived from the payload builder when not set explicitly. Frames
/// shorter than the 60-byte minimum are padded with zeros unless
/// padding is disabled.
#[derive(Debug, Clone)]
pub struct EthernetBuilder {
    dst_addr: Option<MacAddr>,
    src_addr: Option<MacAddr>,
    ether_type: Option<EtherType>,
    pub(crate) payload: Option<Box<Builder>>,
    pub(crate) pad: bool,
}

impl EthernetBuilder {
    pub fn new() -> Self {
        EthernetBuilder {
            dst_addr: None,
            src_addr: None,
            ether_type: None,
            payload: None,
            pad: true,
        }
    }

    /// Set the destination MAC address
    pub fn with_dst_addr(mut self, addr: MacAddr) -> Self {
        self.dst_addr = Some(addr);
        self
    }

    /// Set the source MAC address
    pub fn with_src_addr(mut self, addr: MacAddr) -> Self {
        self.src_addr = Some(addr);
        self
    }

    /// Set the EtherType explicitly instead of deriving it from the
    /// payload builder
    pub fn with_ether_type(mut self, ether_type: EtherType) -> Self {
        self.ether_type = Some(ether_type);
        self
    }

    /// Set the payload builder
    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Enable or disable minimum-frame padding
    pub fn with_padding(mut self, pad: bool) -> Self {
        self.pad = pad;
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, _ctx: &BuildContext) -> Result<Node> {
        let dst_addr = self
            .dst_addr
            .ok_or_else(|| Error::missing_field("Ethernet", "dst_addr"))?;
        let src_addr = self
            .src_addr
            .ok_or_else(|| Error::missing_field("Ethernet", "src_addr"))?;

        // A fresh outer boundary: inner layers see no pseudo-header
        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(&BuildContext::default())?),
            None => None,
        };

        let ether_type = self
            .ether_type
            .or_else(|| self.payload.as_deref().and_then(|p| p.ether_type_hint()))
            .ok_or_else(|| Error::missing_field("Ethernet", "ether_type"))?;

        let payload_len = payload.as_ref().map_or(0, |p| p.len());
        let frame_len = ETHERNET_HEADER_SIZE + payload_len;
        let trailer = if self.pad && frame_len < ETHERNET_MIN_FRAME_SIZE {
            Bytes::from(vec![0u8; ETHERNET_MIN_FRAME_SIZE - frame_len])
        } else {
            Bytes::new()
        };

        Ok(Node::layer(
            Header::Ethernet(EthernetHeader {
                dst_addr,
                src_addr,
                ether_type,
            }),
            payload,
            trailer,
        ))
    }
}

impl Default for EthernetBuilder {
    fn default() -> Self {
        EthernetBuilder::new()
    }
}

impl From<EthernetBuilder> for Builder {
    fn from(b: EthernetBuilder) -> Self {
        Builder::Ethernet(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RawBuilder;

    fn addrs() -> (MacAddr, MacAddr) {
        (
            MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        )
    }

    #[test]
    fn test_build_pads_to_minimum_frame() {
        let (dst, src) = addrs();
        let node = EthernetBuilder::new()
            .with_dst_addr(dst)
            .with_src_addr(src)
            .with_ether_type(EtherType::Other(0x1234))
            .with_payload(RawBuilder::new(vec![1u8, 2, 3, 4]))
            .build_in(&BuildContext::default())
            .unwrap();

        assert_eq!(node.len(), ETHERNET_MIN_FRAME_SIZE);
        assert_eq!(node.trailer().len(), ETHERNET_MIN_FRAME_SIZE - 18);
        let raw = node.raw_octets();
        assert_eq!(&raw[14..18], &[1, 2, 3, 4]);
        assert!(raw[18..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_build_without_padding() {
        let (dst, src) = addrs();
        let node = EthernetBuilder::new()
            .with_dst_addr(dst)
            .with_src_addr(src)
            .with_ether_type(EtherType::Other(0x1234))
            .with_padding(false)
            .with_payload(RawBuilder::new(vec![1u8, 2, 3]))
            .build_in(&BuildContext::default())
            .unwrap();

        assert_eq!(node.len(), 17);
        assert!(node.trailer().is_empty());
    }

    #[test]
    fn test_missing_addresses_fail() {
        let err = EthernetBuilder::new()
            .with_src_addr(addrs().1)
            .with_ether_type(EtherType::Ipv4)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert_eq!(err, Error::missing_field("Ethernet", "dst_addr"));
    }

    #[test]
    fn test_missing_ether_type_fails_for_raw_payload() {
        let (dst, src) = addrs();
        let err = EthernetBuilder::new()
            .with_dst_addr(dst)
            .with_src_addr(src)
            .with_payload(RawBuilder::new(vec![1u8]))
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert_eq!(err, Error::missing_field("Ethernet", "ether_type"));
    }
}
