//! User Datagram Protocol

mod builder;
mod packet;

pub use builder::UdpBuilder;
pub use packet::{decode, UdpHeader, UdpPort, UDP_HEADER_SIZE};
