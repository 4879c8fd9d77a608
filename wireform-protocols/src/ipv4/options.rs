//! IPv4 header options
//!
//! Options are a type-length-value sequence filling the header area
//! beyond the fixed 20 octets. Parsing walks one option at a time,
//! reading the type (and length, for multi-octet kinds) to find the
//! byte span, until an end-of-option-list octet or the area end.

use bytes::{BufMut, Bytes, BytesMut};
use wireform_core::{Error, Result};

/// One IPv4 option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv4Option {
    /// End of option list (kind 0, one octet); the rest of the header
    /// area is padding
    EndOfOptionList,
    /// No operation (kind 1, one octet)
    NoOperation,
    /// Any other option, kept as kind plus value octets
    Other { kind: u8, data: Bytes },
}

impl Ipv4Option {
    /// The option kind octet
    pub fn kind(&self) -> u8 {
        match self {
            Ipv4Option::EndOfOptionList => 0,
            Ipv4Option::NoOperation => 1,
            Ipv4Option::Other { kind, .. } => *kind,
        }
    }

    /// The option's size on the wire
    pub fn wire_len(&self) -> usize {
        match self {
            Ipv4Option::EndOfOptionList | Ipv4Option::NoOperation => 1,
            Ipv4Option::Other { data, .. } => 2 + data.len(),
        }
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        match self {
            Ipv4Option::EndOfOptionList => buf.put_u8(0),
            Ipv4Option::NoOperation => buf.put_u8(1),
            Ipv4Option::Other { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8((2 + data.len()) as u8);
                buf.put_slice(data);
            }
        }
    }
}

/// Total wire length of an option sequence
pub(crate) fn wire_len(options: &[Ipv4Option]) -> usize {
    options.iter().map(|o| o.wire_len()).sum()
}

/// Parse the option area of an IPv4 header
///
/// Returns the options and any padding octets after an end-of-option
/// list. A declared option length that overruns the area is a
/// structural inconsistency.
pub(crate) fn parse(area: &[u8]) -> Result<(Vec<Ipv4Option>, Bytes)> {
    let mut options = Vec::new();
    let mut offset = 0;

    while offset < area.len() {
        let kind = area[offset];
        match kind {
            0 => {
                options.push(Ipv4Option::EndOfOptionList);
                offset += 1;
                return Ok((options, Bytes::copy_from_slice(&area[offset..])));
            }
            1 => {
                options.push(Ipv4Option::NoOperation);
                offset += 1;
            }
            _ => {
                let len = *area.get(offset + 1).ok_or_else(|| {
                    Error::inconsistent("IPv4", format!("option {kind} missing length octet"))
                })? as usize;
                if len < 2 {
                    return Err(Error::inconsistent(
                        "IPv4",
                        format!("option {kind} declares length {len}"),
                    ));
                }
                if offset + len > area.len() {
                    return Err(Error::inconsistent(
                        "IPv4",
                        format!(
                            "option {kind} length {len} exceeds {} remaining header bytes",
                            area.len() - offset
                        ),
                    ));
                }
                options.push(Ipv4Option::Other {
                    kind,
                    data: Bytes::copy_from_slice(&area[offset + 2..offset + len]),
                });
                offset += len;
            }
        }
    }

    Ok((options, Bytes::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_area() {
        let (options, padding) = parse(&[]).unwrap();
        assert!(options.is_empty());
        assert!(padding.is_empty());
    }

    #[test]
    fn test_parse_tlv_then_eol() {
        // Router alert (kind 148, len 4, value 0) + EOL + padding
        let area = [148, 4, 0, 0, 0, 0, 0, 0];
        let (options, padding) = parse(&area).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].kind(), 148);
        assert_eq!(options[0].wire_len(), 4);
        assert_eq!(options[1], Ipv4Option::EndOfOptionList);
        assert_eq!(padding.len(), 3);
    }

    #[test]
    fn test_parse_overrunning_length_is_inconsistent() {
        let area = [148, 12, 0, 0];
        assert!(matches!(
            parse(&area).unwrap_err(),
            Error::Inconsistent { layer: "IPv4", .. }
        ));
    }

    #[test]
    fn test_parse_undersized_length_is_inconsistent() {
        let area = [148, 1, 0, 0];
        assert!(parse(&area).is_err());
    }

    #[test]
    fn test_write_round_trip() {
        let options = vec![
            Ipv4Option::NoOperation,
            Ipv4Option::Other {
                kind: 148,
                data: Bytes::from_static(&[0, 0]),
            },
            Ipv4Option::EndOfOptionList,
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
