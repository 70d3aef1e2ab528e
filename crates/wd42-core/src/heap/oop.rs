//! Managed reference (oop) decoding.
//!
//! HotSpot stores object references either as raw 64-bit addresses or, with
//! compressed oops, as 32-bit values that are shifted and rebased:
//! `address = (ref << shift) + heap_base`.

use serde::{Deserialize, Serialize};

use crate::memory::ReadMemory;
use crate::memory::layout::oop::{COMPRESSED_REF_SIZE, DEFAULT_SHIFT, RAW_REF_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OopConfig {
    pub compressed: bool,
    pub shift: u32,
    pub heap_base: u64,
}

impl Default for OopConfig {
    fn default() -> Self {
        Self {
            compressed: true,
            shift: DEFAULT_SHIFT,
            heap_base: 0,
        }
    }
}

impl OopConfig {
    /// Size of one reference slot in an object or array.
    pub fn reference_size(&self) -> u64 {
        if self.compressed {
            COMPRESSED_REF_SIZE
        } else {
            RAW_REF_SIZE
        }
    }

    /// Decode a raw reference value; zero is null.
    pub fn decode_raw(&self, raw: u64) -> Option<u64> {
        if raw == 0 {
            return None;
        }
        if !self.compressed {
            return Some(raw);
        }
        let shifted = raw.checked_shl(self.shift)?;
        Some(shifted.wrapping_add(self.heap_base))
    }
}

/// Reads reference fields out of the target and decodes them.
pub struct OopDecoder<'a, R: ReadMemory> {
    reader: &'a R,
    config: OopConfig,
}

impl<'a, R: ReadMemory> OopDecoder<'a, R> {
    pub fn new(reader: &'a R, config: OopConfig) -> Self {
        Self { reader, config }
    }

    pub fn config(&self) -> &OopConfig {
        &self.config
    }

    /// Decode the reference stored at `field_address`.
    ///
    /// `None` for a null reference or an unreadable field.
    pub fn decode(&self, field_address: u64) -> Option<u64> {
        let raw = if self.config.compressed {
            u64::from(self.reader.read_u32(field_address).ok()?)
        } else {
            self.reader.read_u64(field_address).ok()?
        };
        self.config.decode_raw(raw)
    }
}
