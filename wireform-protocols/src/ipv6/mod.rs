//! Internet Protocol version 6 and its extension headers

mod builder;
mod extension;
mod packet;

pub use builder::{Ipv6Builder, Ipv6FragmentBuilder, Ipv6OptionsBuilder, Ipv6RoutingBuilder};
pub use extension::{
    decode_dest_options, decode_fragment, decode_hop_by_hop, decode_routing, Ipv6FragmentHeader,
    Ipv6Option, Ipv6OptionsHeader, Ipv6RoutingHeader, RoutingData, IPV6_FRAGMENT_HEADER_SIZE,
};
pub use packet::{decode, Ipv6Header, IPV6_FLOW_LABEL_MAX, IPV6_HEADER_SIZE};
