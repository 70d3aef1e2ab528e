//! Remote memory access primitives.
//!
//! Everything above this module talks to the target through [`ReadMemory`]
//! and [`QueryMemory`], so the scanner and heap reader run unchanged against
//! a live process or the in-memory mock used by tests.

use strum::{Display, EnumString};

use crate::error::{Error, Result};

/// Read access to another process's address space.
///
/// Implementations must not panic on invalid addresses; they return an error.
pub trait ReadMemory {
    /// Copy as many bytes as are readable at `address` into `buf`.
    ///
    /// Returns the number of bytes copied. A read that copies nothing is an error.
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly `size` bytes or fail.
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let read = self.read_into(address, &mut buf)?;
        if read != size {
            return Err(Error::read_failed(
                address,
                format!("short read ({} of {} bytes)", read, size),
            ));
        }
        Ok(buf)
    }

    /// Read up to `size` bytes, keeping whatever prefix was readable.
    fn read_partial(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let read = self.read_into(address, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        let read = self.read_into(address, &mut buf)?;
        if read != N {
            return Err(Error::read_failed(
                address,
                format!("short read ({} of {} bytes)", read, N),
            ));
        }
        Ok(buf)
    }

    fn read_u8(&self, address: u64) -> Result<u8> {
        Ok(self.read_array::<1>(address)?[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        self.read_array(address).map(u16::from_le_bytes)
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        self.read_array(address).map(u32::from_le_bytes)
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        self.read_array(address).map(i32::from_le_bytes)
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        self.read_array(address).map(u64::from_le_bytes)
    }

    fn read_i64(&self, address: u64) -> Result<i64> {
        self.read_array(address).map(i64::from_le_bytes)
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        self.read_array(address).map(f32::from_le_bytes)
    }

    fn read_f64(&self, address: u64) -> Result<f64> {
        self.read_array(address).map(f64::from_le_bytes)
    }
}

/// Region enumeration over the target's virtual address space.
pub trait QueryMemory: ReadMemory {
    /// Lowest and highest application address of the target.
    fn address_bounds(&self) -> (u64, u64);

    /// Describe the region containing `address`, or `None` if the query failed.
    fn query_region(&self, address: u64) -> Option<MemoryRegion>;
}

/// Page protection of a region, without modifier bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Protection {
    NoAccess,
    ReadOnly,
    ReadWrite,
    WriteCopy,
    Execute,
    ExecuteRead,
    ExecuteReadWrite,
    ExecuteWriteCopy,
    Unknown,
}

impl Protection {
    const GUARD: u32 = 0x100;

    /// Split a raw Win32 `PAGE_*` value into its base protection and guard bit.
    pub fn from_raw(raw: u32) -> (Self, bool) {
        let protection = match raw & 0xFF {
            0x01 => Protection::NoAccess,
            0x02 => Protection::ReadOnly,
            0x04 => Protection::ReadWrite,
            0x08 => Protection::WriteCopy,
            0x10 => Protection::Execute,
            0x20 => Protection::ExecuteRead,
            0x40 => Protection::ExecuteReadWrite,
            0x80 => Protection::ExecuteWriteCopy,
            _ => Protection::Unknown,
        };
        (protection, raw & Self::GUARD != 0)
    }

    pub fn is_readable(self) -> bool {
        matches!(
            self,
            Protection::ReadOnly
                | Protection::ReadWrite
                | Protection::WriteCopy
                | Protection::ExecuteRead
                | Protection::ExecuteReadWrite
                | Protection::ExecuteWriteCopy
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: u64,
    pub committed: bool,
    pub protection: Protection,
    pub guard: bool,
}

impl MemoryRegion {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    /// Committed, readable, and not a guard page.
    pub fn is_scannable(&self) -> bool {
        self.committed && !self.guard && self.protection.is_readable()
    }
}
