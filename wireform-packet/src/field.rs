//! Fixed-width field reads
//!
//! All multi-byte fields on the wire are big-endian (network byte
//! order). Reading past the end of the supplied span is a hard
//! truncation error, never a silent zero.

use std::net::{Ipv4Addr, Ipv6Addr};

use wireform_core::{Error, MacAddr, Result};

fn span<'a>(data: &'a [u8], offset: usize, width: usize, layer: &'static str) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(width)
        .ok_or_else(|| Error::truncated(layer, usize::MAX, data.len()))?;
    if data.len() < end {
        return Err(Error::truncated(layer, end, data.len()));
    }
    Ok(&data[offset..end])
}

/// Read one octet at `offset`
pub fn read_u8(data: &[u8], offset: usize, layer: &'static str) -> Result<u8> {
    Ok(span(data, offset, 1, layer)?[0])
}

/// Read a big-endian 16-bit integer at `offset`
pub fn read_u16(data: &[u8], offset: usize, layer: &'static str) -> Result<u16> {
    let s = span(data, offset, 2, layer)?;
    Ok(u16::from_be_bytes([s[0], s[1]]))
}

/// Read a big-endian 32-bit integer at `offset`
pub fn read_u32(data: &[u8], offset: usize, layer: &'static str) -> Result<u32> {
    let s = span(data, offset, 4, layer)?;
    Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
}

/// Read a big-endian 64-bit integer at `offset`
pub fn read_u64(data: &[u8], offset: usize, layer: &'static str) -> Result<u64> {
    let s = span(data, offset, 8, layer)?;
    Ok(u64::from_be_bytes([
        s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
    ]))
}

/// Read a 6-byte MAC address at `offset`
pub fn read_mac(data: &[u8], offset: usize, layer: &'static str) -> Result<MacAddr> {
    let s = span(data, offset, 6, layer)?;
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(s);
    Ok(MacAddr::new(bytes))
}

/// Read a 4-byte IPv4 address at `offset`
pub fn read_ipv4(data: &[u8], offset: usize, layer: &'static str) -> Result<Ipv4Addr> {
    let s = span(data, offset, 4, layer)?;
    Ok(Ipv4Addr::new(s[0], s[1], s[2], s[3]))
}

/// Read a 16-byte IPv6 address at `offset`
pub fn read_ipv6(data: &[u8], offset: usize, layer: &'static str) -> Result<Ipv6Addr> {
    let s = span(data, offset, 16, layer)?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(s);
    Ok(Ipv6Addr::from(bytes))
}
