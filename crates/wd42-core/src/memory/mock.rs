//! In-memory stand-in for a target process.
//!
//! Memory is a sorted set of non-overlapping regions. Typed writes that land
//! outside every region allocate zeroed read-write pages on demand, so tests
//! can lay out object graphs by address without declaring regions first.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::memory::{MemoryRegion, Protection, QueryMemory, ReadMemory};

const PAGE_SIZE: u64 = 0x1000;

#[derive(Debug, Clone)]
struct MockRegion {
    base: u64,
    data: Vec<u8>,
    committed: bool,
    protection: Protection,
    guard: bool,
    query_fails: bool,
    read_fails: bool,
}

impl MockRegion {
    fn new(base: u64, data: Vec<u8>, protection: Protection) -> Self {
        Self {
            base,
            data,
            committed: true,
            protection,
            guard: false,
            query_fails: false,
            read_fails: false,
        }
    }

    fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    fn contains(&self, address: u64) -> bool {
        (self.base..self.end()).contains(&address)
    }

    fn readable(&self) -> bool {
        self.committed && !self.guard && !self.read_fails && self.protection.is_readable()
    }

    fn describe(&self) -> MemoryRegion {
        MemoryRegion {
            base: self.base,
            size: self.data.len() as u64,
            committed: self.committed,
            protection: self.protection,
            guard: self.guard,
        }
    }
}

/// Builder for [`MockMemoryReader`].
#[derive(Debug, Default)]
pub struct MockMemoryBuilder {
    regions: Vec<MockRegion>,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a committed read-write region holding `data`.
    pub fn region(self, base: u64, data: Vec<u8>) -> Self {
        self.region_with(base, data, Protection::ReadWrite)
    }

    /// Add a committed region with an explicit protection.
    pub fn region_with(mut self, base: u64, data: Vec<u8>, protection: Protection) -> Self {
        self.insert(MockRegion::new(base, data, protection));
        self
    }

    /// Add a committed guard-page region.
    pub fn guard_region(mut self, base: u64, data: Vec<u8>) -> Self {
        self.insert(MockRegion {
            guard: true,
            ..MockRegion::new(base, data, Protection::ReadWrite)
        });
        self
    }

    /// Add a reserved (uncommitted) region of `size` bytes.
    pub fn reserved(mut self, base: u64, size: usize) -> Self {
        self.insert(MockRegion {
            committed: false,
            ..MockRegion::new(base, vec![0; size], Protection::NoAccess)
        });
        self
    }

    /// Add a region that queries as committed read-write but fails every read.
    pub fn unreadable_region(mut self, base: u64, data: Vec<u8>) -> Self {
        self.insert(MockRegion {
            read_fails: true,
            ..MockRegion::new(base, data, Protection::ReadWrite)
        });
        self
    }

    /// Add `size` bytes at `base` where region queries fail.
    pub fn query_hole(mut self, base: u64, size: usize) -> Self {
        self.insert(MockRegion {
            query_fails: true,
            read_fails: true,
            ..MockRegion::new(base, vec![0; size], Protection::NoAccess)
        });
        self
    }

    /// Make the page containing `address` inaccessible.
    pub fn no_access(mut self, address: u64) -> Self {
        let base = address & !(PAGE_SIZE - 1);
        self.insert(MockRegion::new(
            base,
            vec![0; PAGE_SIZE as usize],
            Protection::NoAccess,
        ));
        self
    }

    pub fn write_bytes(mut self, address: u64, bytes: &[u8]) -> Self {
        for (i, byte) in bytes.iter().enumerate() {
            let addr = address + i as u64;
            let index = match self.regions.iter().position(|r| r.contains(addr)) {
                Some(index) => index,
                None => self.insert(MockRegion::new(
                    addr & !(PAGE_SIZE - 1),
                    vec![0; PAGE_SIZE as usize],
                    Protection::ReadWrite,
                )),
            };
            let region = &mut self.regions[index];
            region.data[(addr - region.base) as usize] = *byte;
        }
        self
    }

    pub fn write_u32(self, address: u64, value: u32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_i32(self, address: u64, value: i32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_u64(self, address: u64, value: u64) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_f64(self, address: u64, value: f64) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            regions: self.regions,
            reads: Mutex::new(Vec::new()),
        }
    }

    fn insert(&mut self, region: MockRegion) -> usize {
        assert!(
            !self
                .regions
                .iter()
                .any(|r| region.base < r.end() && r.base < region.end()),
            "mock region at 0x{:X} overlaps an existing region",
            region.base
        );
        let pos = self.regions.partition_point(|r| r.base < region.base);
        self.regions.insert(pos, region);
        pos
    }
}

/// Simulated process memory.
#[derive(Debug)]
pub struct MockMemoryReader {
    regions: Vec<MockRegion>,
    reads: Mutex<Vec<(u64, usize)>>,
}

impl MockMemoryReader {
    /// Every `(address, length)` passed to `read_into`, in call order.
    pub fn read_log(&self) -> Vec<(u64, usize)> {
        match self.reads.lock() {
            Ok(reads) => reads.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn region_at(&self, address: u64) -> Option<&MockRegion> {
        self.regions.iter().find(|r| r.contains(address))
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push((address, buf.len()));
        }

        let mut copied = 0usize;
        while copied < buf.len() {
            let addr = address + copied as u64;
            let Some(region) = self.region_at(addr).filter(|r| r.readable()) else {
                break;
            };
            let offset = (addr - region.base) as usize;
            let n = (region.data.len() - offset).min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&region.data[offset..offset + n]);
            copied += n;
        }

        if copied == 0 && !buf.is_empty() {
            return Err(Error::read_failed(address, "address not readable"));
        }
        Ok(copied)
    }
}

impl QueryMemory for MockMemoryReader {
    fn address_bounds(&self) -> (u64, u64) {
        let end = self.regions.last().map(|r| r.end()).unwrap_or(0);
        (0, end)
    }

    fn query_region(&self, address: u64) -> Option<MemoryRegion> {
        if let Some(region) = self.region_at(address) {
            return (!region.query_fails).then(|| region.describe());
        }

        // Free gap up to the next region
        let next = self
            .regions
            .iter()
            .map(|r| r.base)
            .find(|&base| base > address)?;
        Some(MemoryRegion {
            base: address,
            size: next - address,
            committed: false,
            protection: Protection::NoAccess,
            guard: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_writes_allocate_pages() {
        let mock = MockMemoryBuilder::new()
            .write_u64(0x2000, 0xDEAD_BEEF)
            .write_f64(0x5008, 1.5)
            .build();

        assert_eq!(mock.read_u64(0x2000).unwrap(), 0xDEAD_BEEF);
        assert_eq!(mock.read_f64(0x5008).unwrap(), 1.5);
        assert_eq!(mock.read_u32(0x2FF0).unwrap(), 0);
        assert!(mock.read_u32(0x9000).is_err());
    }

    #[test]
    fn test_read_spans_adjacent_pages() {
        let mock = MockMemoryBuilder::new().write_u64(0x1FFC, u64::MAX).build();
        assert_eq!(mock.read_u64(0x1FFC).unwrap(), u64::MAX);
    }

    #[test]
    fn test_partial_read_at_region_end() {
        let mock = MockMemoryBuilder::new()
            .region(0x1000, vec![0xAA; 0x10])
            .build();

        let bytes = mock.read_partial(0x1008, 0x20).unwrap();
        assert_eq!(bytes.len(), 8);
        assert!(mock.read_bytes(0x1008, 0x20).is_err());
    }

    #[test]
    fn test_no_access_page_fails() {
        let mock = MockMemoryBuilder::new().no_access(0x4000).build();
        assert!(mock.read_u64(0x4010).is_err());
    }

    #[test]
    fn test_query_region_reports_gaps() {
        let mock = MockMemoryBuilder::new()
            .region(0x1000, vec![0; 0x1000])
            .reserved(0x4000, 0x1000)
            .build();

        let first = mock.query_region(0x1800).unwrap();
        assert_eq!(first.base, 0x1000);
        assert!(first.is_scannable());

        let gap = mock.query_region(0x2000).unwrap();
        assert_eq!((gap.base, gap.size), (0x2000, 0x2000));
        assert!(!gap.committed);

        let reserved = mock.query_region(0x4000).unwrap();
        assert!(!reserved.committed);

        assert!(mock.query_region(0x5000).is_none());
        assert_eq!(mock.address_bounds(), (0, 0x5000));
    }

    #[test]
    fn test_failure_hooks() {
        let mock = MockMemoryBuilder::new()
            .unreadable_region(0x1000, vec![0xAA; 0x100])
            .query_hole(0x2000, 0x1000)
            .build();

        let region = mock.query_region(0x1000).unwrap();
        assert!(region.is_scannable());
        assert!(mock.read_u8(0x1000).is_err());

        assert!(mock.query_region(0x2800).is_none());
        assert!(mock.read_u8(0x2800).is_err());
    }

    #[test]
    fn test_read_log() {
        let mock = MockMemoryBuilder::new().write_u32(0x1000, 7).build();
        let _ = mock.read_u32(0x1000);
        let _ = mock.read_u64(0x8000);
        assert_eq!(mock.read_log(), vec![(0x1000, 4), (0x8000, 8)]);
    }
}
