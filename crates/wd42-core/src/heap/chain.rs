//! Native pointer chains.
//!
//! A chain is `base -> [+off0] -> [+off1] -> ... -> target`: at every step the
//! current address is dereferenced as a raw 64-bit pointer and the next offset
//! is added. These are native pointers, not managed references, so they are
//! never decoded through [`OopDecoder`](super::OopDecoder).

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::memory::ReadMemory;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerChain {
    /// Absolute start address; zero means the chain is not configured
    pub base: u64,
    pub offsets: Vec<i64>,
}

/// One resolved step of a chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStep {
    /// Address that was dereferenced
    pub address: u64,
    /// Pointer read there
    pub pointer: u64,
    /// `pointer + offset`
    pub next: u64,
}

impl PointerChain {
    pub fn new(base: u64, offsets: Vec<i64>) -> Self {
        Self { base, offsets }
    }

    /// Build a chain from a hex base (`"0x7FF6..."`) and a comma-separated
    /// hex offset list (`"0x10,0x48,-0x20"`).
    ///
    /// A malformed base is zero; a malformed offset token is zero; empty
    /// tokens are skipped.
    pub fn parse(base: &str, offsets: &str) -> Self {
        let offsets = offsets
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                parse_offset(token).unwrap_or_else(|| {
                    warn!("Invalid chain offset '{}', using 0", token);
                    0
                })
            })
            .collect();

        Self {
            base: parse_hex_address(base).unwrap_or_else(|| {
                if !base.trim().is_empty() {
                    warn!("Invalid chain base '{}', using 0", base);
                }
                0
            }),
            offsets,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base != 0
    }

    /// Follow the chain to its target address.
    ///
    /// `None` if the chain is not configured, or any dereference fails or
    /// yields a null pointer. Later offsets are never applied after a failed step.
    pub fn walk<R: ReadMemory>(&self, reader: &R) -> Option<u64> {
        let mut address = self.base;
        for step in self.steps(reader) {
            address = step?.next;
        }
        (address != 0).then_some(address)
    }

    /// Walk the chain, yielding each step. A failed step is yielded as `None`
    /// and ends the iteration.
    pub fn steps<'a, R: ReadMemory>(
        &'a self,
        reader: &'a R,
    ) -> impl Iterator<Item = Option<ChainStep>> + 'a {
        let mut current = (self.base != 0).then_some(self.base);
        let mut offsets = self.offsets.iter();
        std::iter::from_fn(move || {
            let offset = offsets.next()?;
            let address = current.take()?;
            let step = reader
                .read_u64(address)
                .ok()
                .filter(|&pointer| pointer != 0)
                .map(|pointer| ChainStep {
                    address,
                    pointer,
                    next: pointer.wrapping_add_signed(*offset),
                });
            current = step.map(|s| s.next);
            Some(step)
        })
    }
}

impl fmt::Display for PointerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.base)?;
        for offset in &self.offsets {
            if *offset < 0 {
                write!(f, " -> [-0x{:X}]", offset.unsigned_abs())?;
            } else {
                write!(f, " -> [+0x{:X}]", offset)?;
            }
        }
        Ok(())
    }
}

/// Parse a hex address with or without a `0x` prefix.
pub fn parse_hex_address(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_offset(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let value = i64::try_from(parse_hex_address(digits)?).ok()?;
    Some(if negative { -value } else { value })
}
