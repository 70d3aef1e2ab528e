//! Byte patterns with wildcards.
//!
//! Pattern strings are whitespace-separated tokens: two hex digits match one
//! byte exactly, `?` or `??` match any byte.
//!
//! ```text
//! 48 8B 05 ?? ?? ?? ?? 48 85 C0
//! ```

use std::fmt;
use std::str::FromStr;

use memchr::memchr_iter;

use crate::error::{Error, Result};

/// An absolute address in the target where a pattern matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanResult {
    pub address: u64,
}

/// A compiled pattern; `None` positions are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPattern {
    bytes: Vec<Option<u8>>,
}

impl ParsedPattern {
    /// Parse a pattern string. Tokens that are neither hex bytes nor
    /// wildcards are rejected, as is a pattern with no tokens.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        for token in pattern.split_whitespace() {
            if token == "??" || token == "?" {
                bytes.push(None);
                continue;
            }

            if token.len() > 2 {
                return Err(Error::InvalidPattern(format!(
                    "token '{}' is longer than one byte",
                    token
                )));
            }
            let value = u8::from_str_radix(token, 16)
                .map_err(|e| Error::InvalidPattern(format!("token '{}': {}", token, e)))?;
            bytes.push(Some(value));
        }

        if bytes.is_empty() {
            return Err(Error::InvalidPattern("pattern is empty".to_string()));
        }

        Ok(Self { bytes })
    }

    /// A pattern matching `bytes` exactly, with no wildcards.
    pub fn exact(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[Option<u8>] {
        &self.bytes
    }

    /// True if the pattern fits in `buffer` at `offset` and every exact
    /// position matches.
    pub fn matches_at(&self, buffer: &[u8], offset: usize) -> bool {
        let Some(window) = offset
            .checked_add(self.bytes.len())
            .and_then(|end| buffer.get(offset..end))
        else {
            return false;
        };

        self.bytes
            .iter()
            .zip(window)
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
    }

    /// Every start offset in `buffer` where the pattern matches, reported as
    /// `base_address + offset`.
    pub fn scan_buffer(&self, buffer: &[u8], base_address: u64) -> Vec<ScanResult> {
        if self.bytes.is_empty() || buffer.len() < self.bytes.len() {
            return Vec::new();
        }

        let last = buffer.len() - self.bytes.len();
        let to_result = |offset: usize| ScanResult {
            address: base_address + offset as u64,
        };

        // Anchor on the first exact byte so memchr skips most candidates
        let Some((anchor, anchor_byte)) = self
            .bytes
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.map(|value| (i, value)))
        else {
            return (0..=last).map(to_result).collect();
        };

        memchr_iter(anchor_byte, &buffer[anchor..=last + anchor])
            .filter(|&start| self.matches_at(buffer, start))
            .map(to_result)
            .collect()
    }
}

impl FromStr for ParsedPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_pattern(&self.bytes))
    }
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(results: &[ScanResult]) -> Vec<u64> {
        results.iter().map(|r| r.address).collect()
    }

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let pattern = ParsedPattern::parse("48 8D 0D ?? ? ?? ??").unwrap();
        let bytes = pattern.as_slice();
        assert_eq!(bytes.len(), 7);
        assert_eq!(bytes[0], Some(0x48));
        assert_eq!(bytes[1], Some(0x8D));
        assert_eq!(bytes[2], Some(0x0D));
        assert_eq!(bytes[3], None);
        assert_eq!(bytes[4], None);
    }

    #[test]
    fn test_parse_rejects_malformed_tokens() {
        assert!(matches!(
            ParsedPattern::parse("48 XZ 05"),
            Err(Error::InvalidPattern(_))
        ));
        assert!(ParsedPattern::parse("488B").is_err());
        assert!(ParsedPattern::parse("48 ??? 05").is_err());
        assert!(ParsedPattern::parse("").is_err());
        assert!(ParsedPattern::parse("   ").is_err());
    }

    #[test]
    fn test_format_pattern_roundtrip() {
        let pattern: ParsedPattern = "48 8d 0D ? FF".parse().unwrap();
        assert_eq!(pattern.to_string(), "48 8D 0D ?? FF");
        assert_eq!(ParsedPattern::parse(&pattern.to_string()).unwrap(), pattern);
    }

    #[test]
    fn test_scan_buffer_finds_exact_substring() {
        let buffer = [0x00, 0x11, 0x48, 0x8B, 0x05, 0x22, 0x48, 0x8B, 0x05];
        let pattern = ParsedPattern::exact(&[0x48, 0x8B, 0x05]);
        assert_eq!(
            addresses(&pattern.scan_buffer(&buffer, 0x1000)),
            vec![0x1002, 0x1006]
        );
    }

    #[test]
    fn test_wildcard_position_ignores_value() {
        let pattern = ParsedPattern::parse("AA ?? CC").unwrap();
        for middle in [0x00, 0x7F, 0xBB, 0xFF] {
            let buffer = [0x01, 0xAA, middle, 0xCC];
            assert_eq!(addresses(&pattern.scan_buffer(&buffer, 0)), vec![1]);
        }
    }

    #[test]
    fn test_leading_wildcard_anchor() {
        let pattern = ParsedPattern::parse("?? ?? 05").unwrap();
        let buffer = [0x05, 0x01, 0x02, 0x05, 0x05];
        assert_eq!(addresses(&pattern.scan_buffer(&buffer, 0)), vec![1, 2]);
    }

    #[test]
    fn test_all_wildcards_match_everywhere() {
        let pattern = ParsedPattern::parse("?? ??").unwrap();
        assert_eq!(addresses(&pattern.scan_buffer(&[1, 2, 3], 0x10)), vec![0x10, 0x11]);
    }

    #[test]
    fn test_empty_and_oversized_patterns() {
        let empty = ParsedPattern::exact(&[]);
        assert!(empty.is_empty());
        assert!(empty.scan_buffer(&[1, 2, 3], 0).is_empty());

        let long = ParsedPattern::exact(&[1, 2, 3, 4]);
        assert!(long.scan_buffer(&[1, 2, 3], 0).is_empty());
    }

    #[test]
    fn test_matches_at_bounds() {
        let pattern = ParsedPattern::exact(&[2, 3]);
        let buffer = [1, 2, 3];
        assert!(pattern.matches_at(&buffer, 1));
        assert!(!pattern.matches_at(&buffer, 0));
        assert!(!pattern.matches_at(&buffer, 2));
        assert!(!pattern.matches_at(&buffer, usize::MAX));
    }
}
