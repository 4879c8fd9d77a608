//! Internet Control Message Protocol for IPv4

mod builder;
mod packet;

pub use builder::Icmpv4Builder;
pub use packet::{decode, Icmpv4Body, Icmpv4Header, Icmpv4Type, ICMPV4_MIN_SIZE};
