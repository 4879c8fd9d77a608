//! Internet Control Message Protocol for IPv6

mod builder;
mod packet;

pub use builder::Icmpv6Builder;
pub use packet::{decode, Icmpv6Body, Icmpv6Header, Icmpv6Type, ICMPV6_MIN_SIZE};
