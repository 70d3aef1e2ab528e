//! Hex address parsing and formatting utilities.

use anyhow::{Result, anyhow};

/// Parse a hex address string (with or without 0x prefix).
///
/// Unlike configuration values, command-line addresses are strict: a
/// malformed value is an error rather than zero.
pub fn parse_hex_address(s: &str) -> Result<u64> {
    wd42_core::heap::parse_hex_address(s).ok_or_else(|| anyhow!("Invalid hex address: '{}'", s))
}

/// Format an address as a hex string with 0x prefix.
pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}
