//! Field codec primitives for wireform
//!
//! This crate provides the low-level pieces every protocol module is
//! built from:
//!
//! - [`field`] - fixed-width big-endian integer and address reads with
//!   hard truncation errors
//! - [`checksum`] - the Internet Checksum (RFC 1071) and its IPv4/IPv6
//!   pseudo-header variants
//!
//! Serialization uses [`bytes::BufMut`] directly in each protocol
//! module; only the read side needs bounds-checked helpers.

pub mod checksum;
pub mod field;

pub use checksum::{internet_checksum, pseudo_checksum_v4, pseudo_checksum_v6, verify_checksum};
pub use field::{read_ipv4, read_ipv6, read_mac, read_u16, read_u32, read_u64, read_u8};
