//! 802.1Q tag builder

use bytes::Bytes;
use wireform_core::{Error, Result};

use crate::builder::Builder;
use crate::context::BuildContext;
use crate::ethernet::EtherType;
use crate::node::{Header, Node};

use super::packet::{Dot1qHeader, DOT1Q_MAX_VLAN_ID};

/// Builder for 802.1Q tags
///
/// The VLAN identifier is required; priority and CFI default to zero.
/// The inner EtherType is derived from the payload builder when not set
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct Dot1qBuilder {
    priority: u8,
    cfi: bool,
    vid: Option<u16>,
    ether_type: Option<EtherType>,
    pub(crate) payload: Option<Box<Builder>>,
}

impl Dot1qBuilder {
    pub fn new() -> Self {
        Dot1qBuilder::default()
    }

    /// Set the priority code point (0-7)
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the CFI / drop-eligible bit
    pub fn with_cfi(mut self, cfi: bool) -> Self {
        self.cfi = cfi;
        self
    }

    /// Set the VLAN identifier (0-4094)
    pub fn with_vid(mut self, vid: u16) -> Self {
        self.vid = Some(vid);
        self
    }

    /// Set the inner EtherType explicitly
    pub fn with_ether_type(mut self, ether_type: EtherType) -> Self {
        self.ether_type = Some(ether_type);
        self
    }

    /// Set the payload builder
    pub fn with_payload(mut self, payload: impl Into<Builder>) -> Self {
        self.payload = Some(Box::new(payload.into()));
        self
    }

    /// Build this layer and everything below it
    pub fn build(&self) -> Result<Node> {
        self.build_in(&BuildContext::default())
    }

    pub(crate) fn build_in(&self, ctx: &BuildContext) -> Result<Node> {
        let vid = self
            .vid
            .ok_or_else(|| Error::missing_field("802.1Q", "vid"))?;
        if vid > DOT1Q_MAX_VLAN_ID {
            return Err(Error::field_overflow(
                "802.1Q",
                "vid",
                format!("{vid} exceeds 12 bits"),
            ));
        }
        if self.priority > 7 {
            return Err(Error::field_overflow(
                "802.1Q",
                "priority",
                format!("{} exceeds 3 bits", self.priority),
            ));
        }

        let payload = match &self.payload {
            Some(builder) => Some(builder.build_in(ctx)?),
            None => None,
        };

        let ether_type = self
            .ether_type
            .or_else(|| self.payload.as_deref().and_then(|p| p.ether_type_hint()))
            .ok_or_else(|| Error::missing_field("802.1Q", "ether_type"))?;

        Ok(Node::layer(
            Header::Dot1q(Dot1qHeader {
                priority: self.priority,
                cfi: self.cfi,
                vid,
                ether_type,
            }),
            payload,
            Bytes::new(),
        ))
    }
}

impl From<Dot1qBuilder> for Builder {
    fn from(b: Dot1qBuilder) -> Self {
        Builder::Dot1q(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RawBuilder;

    #[test]
    fn test_build_and_reparse_tag_fields() {
        let node = Dot1qBuilder::new()
            .with_priority(5)
            .with_cfi(true)
            .with_vid(100)
            .with_ether_type(EtherType::Other(0x1234))
            .with_payload(RawBuilder::new(vec![0xde, 0xad]))
            .build_in(&BuildContext::default())
            .unwrap();

        let header = node.header().unwrap().as_dot1q().unwrap();
        assert_eq!(header.priority, 5);
        assert!(header.cfi);
        assert_eq!(header.vid, 100);
        assert_eq!(node.raw_octets()[..2], [0xb0, 0x64]);
    }

    #[test]
    fn test_vid_required() {
        let err = Dot1qBuilder::new()
            .with_ether_type(EtherType::Ipv4)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert_eq!(err, Error::missing_field("802.1Q", "vid"));
    }

    #[test]
    fn test_vid_overflow_rejected() {
        let err = Dot1qBuilder::new()
            .with_vid(4095)
            .with_ether_type(EtherType::Ipv4)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::FieldOverflow { field: "vid", .. }));
    }

    #[test]
    fn test_priority_overflow_rejected() {
        let err = Dot1qBuilder::new()
            .with_vid(1)
            .with_priority(8)
            .with_ether_type(EtherType::Ipv4)
            .build_in(&BuildContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::FieldOverflow { field: "priority", .. }));
    }
}
