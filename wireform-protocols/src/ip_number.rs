//! IANA Internet protocol numbers
//!
//! Shared between IPv4 (protocol field) and IPv6 (next-header chain).

use std::fmt;

/// IP protocol / next-header numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpNumber {
    /// IPv6 Hop-by-Hop Options (0)
    HopByHop,
    /// ICMP (1)
    Icmpv4,
    /// IGMP (2)
    Igmp,
    /// IPv4 encapsulation (4)
    Ipv4,
    /// TCP (6)
    Tcp,
    /// UDP (17)
    Udp,
    /// IPv6 encapsulation (41)
    Ipv6,
    /// IPv6 Routing header (43)
    Ipv6Route,
    /// IPv6 Fragment header (44)
    Ipv6Frag,
    /// GRE (47)
    Gre,
    /// ESP (50)
    Esp,
    /// AH (51)
    Ah,
    /// ICMPv6 (58)
    Icmpv6,
    /// IPv6 no next header (59)
    NoNextHeader,
    /// IPv6 Destination Options (60)
    Ipv6DestOpts,
    /// OSPF (89)
    Ospf,
    /// Any other protocol number
    Other(u8),
}

impl IpNumber {
    /// Convert to the wire value
    pub fn to_u8(self) -> u8 {
        match self {
            IpNumber::HopByHop => 0,
            IpNumber::Icmpv4 => 1,
            IpNumber::Igmp => 2,
            IpNumber::Ipv4 => 4,
            IpNumber::Tcp => 6,
            IpNumber::Udp => 17,
            IpNumber::Ipv6 => 41,
            IpNumber::Ipv6Route => 43,
            IpNumber::Ipv6Frag => 44,
            IpNumber::Gre => 47,
            IpNumber::Esp => 50,
            IpNumber::Ah => 51,
            IpNumber::Icmpv6 => 58,
            IpNumber::NoNextHeader => 59,
            IpNumber::Ipv6DestOpts => 60,
            IpNumber::Ospf => 89,
            IpNumber::Other(val) => val,
        }
    }

    /// Create from the wire value
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => IpNumber::HopByHop,
            1 => IpNumber::Icmpv4,
            2 => IpNumber::Igmp,
            4 => IpNumber::Ipv4,
            6 => IpNumber::Tcp,
            17 => IpNumber::Udp,
            41 => IpNumber::Ipv6,
            43 => IpNumber::Ipv6Route,
            44 => IpNumber::Ipv6Frag,
            47 => IpNumber::Gre,
            50 => IpNumber::Esp,
            51 => IpNumber::Ah,
            58 => IpNumber::Icmpv6,
            59 => IpNumber::NoNextHeader,
            60 => IpNumber::Ipv6DestOpts,
            89 => IpNumber::Ospf,
            val => IpNumber::Other(val),
        }
    }

    /// The symbolic name for the wire value
    pub fn name(&self) -> &'static str {
        match self {
            IpNumber::HopByHop => "IPv6 Hop-by-Hop Options",
            IpNumber::Icmpv4 => "ICMP",
            IpNumber::Igmp => "IGMP",
            IpNumber::Ipv4 => "IPv4",
            IpNumber::Tcp => "TCP",
            IpNumber::Udp => "UDP",
            IpNumber::Ipv6 => "IPv6",
            IpNumber::Ipv6Route => "IPv6 Routing",
            IpNumber::Ipv6Frag => "IPv6 Fragment",
            IpNumber::Gre => "GRE",
            IpNumber::Esp => "ESP",
            IpNumber::Ah => "AH",
            IpNumber::Icmpv6 => "ICMPv6",
            IpNumber::NoNextHeader => "No Next Header",
            IpNumber::Ipv6DestOpts => "IPv6 Destination Options",
            IpNumber::Ospf => "OSPF",
            IpNumber::Other(_) => "unknown",
        }
    }
}

impl fmt::Display for IpNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpNumber::Other(val) => write!(f, "protocol {val}"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

impl From<u8> for IpNumber {
    fn from(value: u8) -> Self {
        IpNumber::from_u8(value)
    }
}

impl From<IpNumber> for u8 {
    fn from(value: IpNumber) -> Self {
        value.to_u8()
    }
}
