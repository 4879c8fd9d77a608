//! IEEE 802.1Q VLAN tags

mod builder;
mod packet;

pub use builder::Dot1qBuilder;
pub use packet::{decode, Dot1qHeader, DOT1Q_HEADER_SIZE, DOT1Q_MAX_VLAN_ID};
