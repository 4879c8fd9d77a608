//! Error types for wireform

use thiserror::Error;

/// Result type alias for wireform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wireform
///
/// Decode-time data errors ([`Error::Truncated`], [`Error::Inconsistent`])
/// are recoverable: the factory registry converts them into illegal-data
/// leaves so the rest of the capture stays usable. Builder precondition
/// errors ([`Error::MissingField`], [`Error::FieldOverflow`]) indicate a
/// caller bug and abort construction of the node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fewer octets supplied than a header's declared minimum size
    #[error("truncated {layer}: need at least {needed} bytes, got {got}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        got: usize,
    },

    /// A self-describing length/offset field disagrees with the octets available
    #[error("inconsistent {layer}: {reason}")]
    Inconsistent { layer: &'static str, reason: String },

    /// A required builder field was never set
    #[error("cannot build {layer}: field '{field}' is not set")]
    MissingField {
        layer: &'static str,
        field: &'static str,
    },

    /// A builder field value does not fit its declared bit width
    #[error("cannot build {layer}: field '{field}' {reason}")]
    FieldOverflow {
        layer: &'static str,
        field: &'static str,
        reason: String,
    },

    /// Fragmenting a packet failed
    #[error("fragmentation error: {0}")]
    Fragmentation(String),

    /// Reassembling fragments failed (gaps, overlaps, mismatched identity)
    #[error("reassembly error: {0}")]
    Reassembly(String),

    /// Codec configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a truncation error for a layer
    pub fn truncated(layer: &'static str, needed: usize, got: usize) -> Self {
        Error::Truncated { layer, needed, got }
    }

    /// Create a structural-inconsistency error for a layer
    pub fn inconsistent<S: Into<String>>(layer: &'static str, reason: S) -> Self {
        Error::Inconsistent {
            layer,
            reason: reason.into(),
        }
    }

    /// Create a missing-field builder error
    pub fn missing_field(layer: &'static str, field: &'static str) -> Self {
        Error::MissingField { layer, field }
    }

    /// Create a field-overflow builder error
    pub fn field_overflow<S: Into<String>>(
        layer: &'static str,
        field: &'static str,
        reason: S,
    ) -> Self {
        Error::FieldOverflow {
            layer,
            field,
            reason: reason.into(),
        }
    }

    /// True for decode-time data errors that the registry downgrades to
    /// an illegal-data leaf instead of propagating
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Error::Truncated { .. } | Error::Inconsistent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_display() {
        let err = Error::truncated("IPv4", 20, 10);
        assert_eq!(
            err.to_string(),
            "truncated IPv4: need at least 20 bytes, got 10"
        );
    }

    #[test]
    fn test_decode_error_classification() {
        assert!(Error::truncated("TCP", 20, 3).is_decode_error());
        assert!(Error::inconsistent("TCP", "bad data offset").is_decode_error());
        assert!(!Error::missing_field("Ethernet", "dst_addr").is_decode_error());
        assert!(!Error::field_overflow("Dot1q", "vid", "exceeds 12 bits").is_decode_error());
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = Error::inconsistent("UDP", "length exceeds datagram");
        let copy = err.clone();
        assert_eq!(err, copy);
    }
}
