//! TCP header options
//!
//! A type-length-value sequence terminated by an explicit
//! end-of-option-list octet or by reaching the header length the data
//! offset declares.

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{Error, Result};

/// One TCP option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpOption {
    /// End of option list (kind 0, one octet); the rest of the header
    /// area is padding
    EndOfOptionList,
    /// No operation (kind 1, one octet)
    NoOperation,
    /// Maximum segment size (kind 2)
    MaximumSegmentSize(u16),
    /// Window scale shift count (kind 3)
    WindowScale(u8),
    /// SACK permitted (kind 4)
    SackPermitted,
    /// Timestamps (kind 8)
    Timestamps { ts_value: u32, ts_echo_reply: u32 },
    /// Any other option, kept as kind plus value octets
    Other { kind: u8, data: Bytes },
}

impl TcpOption {
    /// The option kind octet
    pub fn kind(&self) -> u8 {
        match self {
            TcpOption::EndOfOptionList => 0,
            TcpOption::NoOperation => 1,
            TcpOption::MaximumSegmentSize(_) => 2,
            TcpOption::WindowScale(_) => 3,
            TcpOption::SackPermitted => 4,
            TcpOption::Timestamps { .. } => 8,
            TcpOption::Other { kind, .. } => *kind,
        }
    }

    /// The option's size on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            TcpOption::EndOfOptionList | TcpOption::NoOperation => 1,
            TcpOption::MaximumSegmentSize(_) => 4,
            TcpOption::WindowScale(_) => 3,
            TcpOption::SackPermitted => 2,
            TcpOption::Timestamps { .. } => 10,
            TcpOption::Other { data, .. } => 2 + data.len(),
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        match self {
            TcpOption::EndOfOptionList => buf.put_u8(0),
            TcpOption::NoOperation => buf.put_u8(1),
            TcpOption::MaximumSegmentSize(mss) => {
                buf.put_u8(2);
                buf.put_u8(4);
                buf.put_u16(*mss);
            }
            TcpOption::WindowScale(shift) => {
                buf.put_u8(3);
                buf.put_u8(3);
                buf.put_u8(*shift);
            }
            TcpOption::SackPermitted => {
                buf.put_u8(4);
                buf.put_u8(2);
            }
            TcpOption::Timestamps {
                ts_value,
                ts_echo_reply,
            } => {
                buf.put_u8(8);
                buf.put_u8(10);
                buf.put_u32(*ts_value);
                buf.put_u32(*ts_echo_reply);
            }
            TcpOption::Other { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8((2 + data.len()) as u8);
                buf.put_slice(data);
            }
        }
    }
}

/// Total wire length of an option sequence
pub(crate) fn wire_len(options: &[TcpOption]) -> usize {
    options.iter().map(|o| o.wire_len()).sum()
}

fn fixed_length(kind: u8, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(Error::inconsistent(
            "TCP",
            format!("option {kind} declares length {len}, expected {expected}"),
        ));
    }
    Ok(())
}

/// Parse the option area of a TCP header
///
/// Returns the options and any padding octets after an end-of-option
/// list.
pub(crate) fn parse(area: &[u8]) -> Result<(Vec<TcpOption>, Bytes)> {
    let mut options = Vec::new();
    let mut offset = 0;

    while offset < area.len() {
        let kind = area[offset];
        match kind {
            0 => {
                options.push(TcpOption::EndOfOptionList);
                offset += 1;
                return Ok((options, Bytes::copy_from_slice(&area[offset..])));
            }
            1 => {
                options.push(TcpOption::NoOperation);
                offset += 1;
                continue;
            }
            _ => {}
        }

        let len = *area.get(offset + 1).ok_or_else(|| {
            Error::inconsistent("TCP", format!("option {kind} missing length octet"))
        })? as usize;
        if len < 2 {
            return Err(Error::inconsistent(
                "TCP",
                format!("option {kind} declares length {len}"),
            ));
        }
        if offset + len > area.len() {
            return Err(Error::inconsistent(
                "TCP",
                format!(
                    "option {kind} length {len} exceeds {} remaining header bytes",
                    area.len() - offset
                ),
            ));
        }
        let value = &area[offset + 2..offset + len];

        let option = match kind {
            2 => {
                fixed_length(kind, len, 4)?;
                TcpOption::MaximumSegmentSize(u16::from_be_bytes([value[0], value[1]]))
            }
            3 => {
                fixed_length(kind, len, 3)?;
                TcpOption::WindowScale(value[0])
            }
            4 => {
                fixed_length(kind, len, 2)?;
                TcpOption::SackPermitted
            }
            8 => {
                fixed_length(kind, len, 10)?;
                TcpOption::Timestamps {
                    ts_value: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
                    ts_echo_reply: u32::from_be_bytes([value[4], value[5], value[6], value[7]]),
                }
            }
            _ => TcpOption::Other {
                kind,
                data: Bytes::copy_from_slice(value),
            },
        };
        options.push(option);
        offset += len;
    }

    Ok((options, Bytes::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mss_then_eol() {
        let area = [2, 4, 0x05, 0xb4, 0, 0, 0, 0];
        let (options, padding) = parse(&area).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0], TcpOption::MaximumSegmentSize(1460));
        assert_eq!(options[1], TcpOption::EndOfOptionList);
        assert_eq!(padding.len(), 3);
    }

    #[test]
    fn test_parse_syn_option_block() {
        // MSS, NOP, window scale, NOP, NOP, timestamps
        let mut area = vec![2, 4, 0x05, 0xb4, 1, 3, 3, 7, 1, 1];
        area.extend_from_slice(&[8, 10]);
        area.extend_from_slice(&100u32.to_be_bytes());
        area.extend_from_slice(&0u32.to_be_bytes());

        let (options, padding) = parse(&area).unwrap();
        assert_eq!(options.len(), 6);
        assert_eq!(options[2], TcpOption::WindowScale(7));
        assert_eq!(
            options[5],
            TcpOption::Timestamps {
                ts_value: 100,
                ts_echo_reply: 0
            }
        );
        assert!(padding.is_empty());
    }

    #[test]
    fn test_parse_wrong_mss_length_is_inconsistent() {
        let area = [2, 3, 0x05];
        assert!(parse(&area).is_err());
    }

    #[test]
    fn test_parse_overrun_is_inconsistent() {
        let area = [5, 12, 0, 0];
        assert!(parse(&area).is_err());
    }

    #[test]
    fn test_write_round_trip() {
        let options = vec![
            TcpOption::MaximumSegmentSize(1460),
            TcpOption::SackPermitted,
            TcpOption::Other {
                kind: 254,
                data: Bytes::from_static(&[0xaa, 0xbb]),
            },
            TcpOption::EndOfOptionList,
        ];
        let mut buf = BytesMut::new();
        for option in &options {
            option.write(&mut buf);
        }
        assert_eq!(buf.len(), wire_len(&options));
        let (parsed, padding) = parse(&buf).unwrap();
        assert_eq!(parsed, options);
        assert!(padding.is_empty());
    }
}
