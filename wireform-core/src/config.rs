//! Codec configuration
//!
//! A small set of named boolean options gating whether decode-time
//! checksum verification is performed, per protocol family. The
//! configuration is installed once at process start and read-only
//! afterwards; decoders consult [`global`] and never re-read options
//! mid-stream.

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{Error, Result};

static GLOBAL: OnceCell<CodecConfig> = OnceCell::new();

/// Decode-time validation policy, one flag per protocol family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Verify the IPv4 header checksum while decoding
    pub verify_ipv4_checksum: bool,
    /// Verify ICMPv4 message checksums while decoding
    pub verify_icmpv4_checksum: bool,
    /// Verify ICMPv6 message checksums while decoding
    pub verify_icmpv6_checksum: bool,
    /// Verify TCP segment checksums while decoding
    pub verify_tcp_checksum: bool,
    /// Verify UDP datagram checksums while decoding
    pub verify_udp_checksum: bool,
}

impl CodecConfig {
    /// All verification enabled
    pub const fn new() -> Self {
        CodecConfig {
            verify_ipv4_checksum: true,
            verify_icmpv4_checksum: true,
            verify_icmpv6_checksum: true,
            verify_tcp_checksum: true,
            verify_udp_checksum: true,
        }
    }

    /// All verification disabled
    pub const fn permissive() -> Self {
        CodecConfig {
            verify_ipv4_checksum: false,
            verify_icmpv4_checksum: false,
            verify_icmpv6_checksum: false,
            verify_tcp_checksum: false,
            verify_udp_checksum: false,
        }
    }

    /// Set IPv4 header checksum verification
    pub fn with_ipv4_checksum(mut self, verify: bool) -> Self {
        self.verify_ipv4_checksum = verify;
        self
    }

    /// Set ICMPv4 checksum verification
    pub fn with_icmpv4_checksum(mut self, verify: bool) -> Self {
        self.verify_icmpv4_checksum = verify;
        self
    }

    /// Set ICMPv6 checksum verification
    pub fn with_icmpv6_checksum(mut self, verify: bool) -> Self {
        self.verify_icmpv6_checksum = verify;
        self
    }

    /// Set TCP checksum verification
    pub fn with_tcp_checksum(mut self, verify: bool) -> Self {
        self.verify_tcp_checksum = verify;
        self
    }

    /// Set UDP checksum verification
    pub fn with_udp_checksum(mut self, verify: bool) -> Self {
        self.verify_udp_checksum = verify;
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig::new()
    }
}

/// Install the process-wide codec configuration
///
/// Must be called before any decode activity. Returns an error if a
/// configuration was already installed (including implicitly, by a
/// decoder touching the default).
pub fn init(config: CodecConfig) -> Result<()> {
    debug!(?config, "installing codec configuration");
    GLOBAL
        .set(config)
        .map_err(|_| Error::Config("codec configuration already installed".to_string()))
}

/// The process-wide codec configuration
///
/// Falls back to [`CodecConfig::new`] (all verification on) when
/// [`init`] was never called.
pub fn global() -> &'static CodecConfig {
    GLOBAL.get_or_init(CodecConfig::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_verifies_everything() {
        let config = CodecConfig::default();
        assert!(config.verify_ipv4_checksum);
        assert!(config.verify_icmpv4_checksum);
        assert!(config.verify_icmpv6_checksum);
        assert!(config.verify_tcp_checksum);
        assert!(config.verify_udp_checksum);
    }

    #[test]
    fn test_permissive_verifies_nothing() {
        let config = CodecConfig::permissive();
        assert!(!config.verify_ipv4_checksum);
        assert!(!config.verify_udp_checksum);
    }

    #[test]
    fn test_builder_style_overrides() {
        let config = CodecConfig::new()
            .with_tcp_checksum(false)
            .with_udp_checksum(false);
        assert!(config.verify_ipv4_checksum);
        assert!(!config.verify_tcp_checksum);
        assert!(!config.verify_udp_checksum);
    }
}
