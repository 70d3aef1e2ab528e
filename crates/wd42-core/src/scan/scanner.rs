//! Pattern scanning over a remote address space.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Result;
use crate::memory::layout::scan::CHUNK_SIZE;
use crate::memory::{MemoryRegion, QueryMemory};
use crate::scan::{ParsedPattern, ScanResult};

/// Step used to skip past an address the OS refused to describe.
const QUERY_FAILURE_STEP: u64 = 0x1000;

/// Consecutive failed region queries after which the walk gives up. A target
/// that has exited fails every query.
const MAX_QUERY_FAILURES: u32 = 16;

/// A code pattern whose match contains a RIP-relative operand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSignature {
    pub pattern: String,
    /// Offset of the instruction within the pattern match
    #[serde(default)]
    pub instr_offset: u64,
    /// Offset of the 32-bit displacement within the instruction
    pub disp_offset: u64,
    pub instr_len: u64,
    /// Dereference the resolved address once
    #[serde(default)]
    pub deref: bool,
}

pub struct MemoryScanner<'a, R: QueryMemory> {
    reader: &'a R,
    cancel: Option<&'a AtomicBool>,
    chunk_size: usize,
}

impl<'a, R: QueryMemory> MemoryScanner<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            cancel: None,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Stop scanning between regions (and chunks) once `flag` becomes true.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Scan every committed, readable region between the target's minimum and
    /// maximum application address.
    ///
    /// A region that cannot be read is skipped; the walk always advances past
    /// the region the OS reported.
    pub fn scan_process(&self, pattern: &ParsedPattern) -> Vec<ScanResult> {
        let mut results = Vec::new();
        if pattern.is_empty() {
            return results;
        }

        let (mut address, end) = self.reader.address_bounds();
        let mut regions_scanned = 0usize;
        let mut query_failures = 0u32;

        while address < end {
            if self.is_cancelled() {
                debug!("Scan cancelled at 0x{:X}", address);
                break;
            }

            let Some(region) = self.reader.query_region(address) else {
                query_failures += 1;
                if query_failures >= MAX_QUERY_FAILURES {
                    debug!(
                        "Giving up scan at 0x{:X} after {} failed region queries",
                        address, query_failures
                    );
                    break;
                }
                trace!("Region query failed at 0x{:X}", address);
                address = address.saturating_add(QUERY_FAILURE_STEP);
                continue;
            };
            query_failures = 0;

            if region.is_scannable() {
                self.scan_region(&region, pattern, &mut results);
                regions_scanned += 1;
            }

            let next = region.end();
            if next <= address {
                // Non-progressing region; step past it rather than spin
                address = address.saturating_add(QUERY_FAILURE_STEP);
            } else {
                address = next;
            }
        }

        debug!(
            "Scanned {} regions for '{}': {} matches",
            regions_scanned,
            pattern,
            results.len()
        );
        results
    }

    /// Scan a single window of `size` bytes at `start`. Unreadable memory
    /// yields no results; a partially readable window is scanned as far as
    /// it could be read.
    pub fn scan_range(&self, pattern: &ParsedPattern, start: u64, size: usize) -> Vec<ScanResult> {
        if pattern.is_empty() || size == 0 {
            return Vec::new();
        }

        match self.reader.read_partial(start, size) {
            Ok(buffer) => pattern.scan_buffer(&buffer, start),
            Err(e) => {
                debug!("Range scan at 0x{:X} failed: {}", start, e);
                Vec::new()
            }
        }
    }

    /// Resolve a RIP-relative operand: read the signed 32-bit displacement at
    /// `instr_addr + disp_offset` and add it to the address of the next
    /// instruction. `None` if the displacement cannot be read.
    pub fn resolve_displacement(&self, instr_addr: u64, disp_offset: u64, instr_len: u64) -> Option<u64> {
        let disp = self
            .reader
            .read_i32(instr_addr.wrapping_add(disp_offset))
            .ok()?;
        let next_ip = instr_addr.wrapping_add(instr_len);
        Some(next_ip.wrapping_add_signed(i64::from(disp)))
    }

    /// Scan for a code signature and resolve every match to its target address.
    pub fn resolve_signature(&self, signature: &CodeSignature) -> Result<Vec<u64>> {
        let pattern = ParsedPattern::parse(&signature.pattern)?;
        let mut targets = Vec::new();

        for hit in self.scan_process(&pattern) {
            let instr_addr = hit.address + signature.instr_offset;
            let Some(mut target) =
                self.resolve_displacement(instr_addr, signature.disp_offset, signature.instr_len)
            else {
                continue;
            };

            if signature.deref {
                match self.reader.read_u64(target) {
                    Ok(ptr) => target = ptr,
                    Err(_) => continue,
                }
            }

            if target != 0 {
                targets.push(target);
            }
        }

        targets.sort_unstable();
        targets.dedup();
        Ok(targets)
    }

    fn scan_region(&self, region: &MemoryRegion, pattern: &ParsedPattern, results: &mut Vec<ScanResult>) {
        let overlap = pattern.len().saturating_sub(1);
        let mut offset = 0u64;

        while offset < region.size {
            let address = region.base + offset;
            let size = (region.size - offset).min(self.chunk_size as u64) as usize;

            let chunk = match self.reader.read_partial(address, size) {
                Ok(bytes) => bytes,
                Err(e) => {
                    trace!("Skipping region 0x{:X}: {}", region.base, e);
                    return;
                }
            };
            results.extend(pattern.scan_buffer(&chunk, address));

            let done = chunk.len() < size || offset + size as u64 >= region.size;
            if done || self.is_cancelled() {
                return;
            }

            // Re-read the seam so matches spanning two chunks are kept
            offset += size.saturating_sub(overlap).max(1) as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::error::Error;
    use crate::memory::{MockMemoryBuilder, Protection, ReadMemory};

    /// A target that has exited: every query and read fails.
    #[derive(Default)]
    struct ExitedProcess {
        queries: AtomicUsize,
    }

    impl ReadMemory for ExitedProcess {
        fn read_into(&self, address: u64, _buf: &mut [u8]) -> Result<usize> {
            Err(Error::read_failed(address, "process exited"))
        }
    }

    impl QueryMemory for ExitedProcess {
        fn address_bounds(&self) -> (u64, u64) {
            (0x10000, 0x7FFF_FFFE_FFFF)
        }

        fn query_region(&self, _address: u64) -> Option<MemoryRegion> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn addresses(results: &[ScanResult]) -> Vec<u64> {
        results.iter().map(|r| r.address).collect()
    }

    fn region_with_marker(len: usize, at: usize, marker: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[at..at + marker.len()].copy_from_slice(marker);
        data
    }

    #[test]
    fn test_scan_process_respects_protection() {
        let marker = [0xDE, 0xAD, 0xBE, 0xEF];
        let mock = MockMemoryBuilder::new()
            .region(0x1000, region_with_marker(0x100, 0x10, &marker))
            .region_with(0x2000, region_with_marker(0x100, 0x20, &marker), Protection::ExecuteRead)
            .region_with(0x3000, region_with_marker(0x100, 0x30, &marker), Protection::NoAccess)
            .guard_region(0x4000, region_with_marker(0x100, 0x40, &marker))
            .region_with(0x6000, region_with_marker(0x100, 0x60, &marker), Protection::WriteCopy)
            .build();

        let scanner = MemoryScanner::new(&mock);
        let results = scanner.scan_process(&ParsedPattern::exact(&marker));
        assert_eq!(addresses(&results), vec![0x1010, 0x2020, 0x6060]);
    }

    #[test]
    fn test_scan_process_skips_uncommitted() {
        let mock = MockMemoryBuilder::new()
            .reserved(0x1000, 0x1000)
            .region(0x8000, vec![0x90; 4])
            .build();

        let scanner = MemoryScanner::new(&mock);
        let results = scanner.scan_process(&ParsedPattern::parse("90 90").unwrap());
        assert_eq!(addresses(&results), vec![0x8000, 0x8001, 0x8002]);
    }

    #[test]
    fn test_failed_region_read_does_not_stop_scan() {
        let marker = [0x5A, 0xA5];
        let mock = MockMemoryBuilder::new()
            .region(0x1000, region_with_marker(0x100, 0x10, &marker))
            .unreadable_region(0x2000, region_with_marker(0x100, 0x10, &marker))
            .region(0x3000, region_with_marker(0x100, 0x20, &marker))
            .build();

        let results = MemoryScanner::new(&mock).scan_process(&ParsedPattern::exact(&marker));
        assert_eq!(addresses(&results), vec![0x1010, 0x3020]);
    }

    #[test]
    fn test_failed_region_query_is_skipped() {
        let marker = [0x5A, 0xA5];
        let mock = MockMemoryBuilder::new()
            .region(0x1000, region_with_marker(0x100, 0x10, &marker))
            .query_hole(0x2000, 0x1000)
            .region(0x3000, region_with_marker(0x100, 0x20, &marker))
            .build();

        let results = MemoryScanner::new(&mock).scan_process(&ParsedPattern::exact(&marker));
        assert_eq!(addresses(&results), vec![0x1010, 0x3020]);
    }

    #[test]
    fn test_exited_process_scan_gives_up() {
        let process = ExitedProcess::default();
        let results = MemoryScanner::new(&process).scan_process(&ParsedPattern::exact(&[0x90]));

        assert!(results.is_empty());
        assert_eq!(
            process.queries.load(Ordering::SeqCst),
            MAX_QUERY_FAILURES as usize
        );
    }

    #[test]
    fn test_chunked_scan_keeps_seam_matches() {
        let marker = [1, 2, 3, 4, 5];
        // Marker straddles the 16-byte chunk boundary
        let mock = MockMemoryBuilder::new()
            .region(0x1000, region_with_marker(64, 14, &marker))
            .build();

        let scanner = MemoryScanner::new(&mock).with_chunk_size(16);
        let results = scanner.scan_process(&ParsedPattern::exact(&marker));
        assert_eq!(addresses(&results), vec![0x100E]);
    }

    #[test]
    fn test_chunked_scan_reports_each_match_once() {
        let mock = MockMemoryBuilder::new().region(0x1000, vec![0xCC; 40]).build();
        let scanner = MemoryScanner::new(&mock).with_chunk_size(8);
        let results = scanner.scan_process(&ParsedPattern::exact(&[0xCC, 0xCC, 0xCC]));
        let expected: Vec<u64> = (0x1000..=0x1000 + 37).collect();
        assert_eq!(addresses(&results), expected);
    }

    #[test]
    fn test_cancelled_scan_returns_nothing() {
        let mock = MockMemoryBuilder::new().region(0x1000, vec![0xAB; 16]).build();
        let cancel = AtomicBool::new(true);
        let scanner = MemoryScanner::new(&mock).with_cancel(&cancel);
        assert!(scanner.scan_process(&ParsedPattern::exact(&[0xAB])).is_empty());
    }

    #[test]
    fn test_scan_range() {
        let mock = MockMemoryBuilder::new()
            .region(0x1000, region_with_marker(0x40, 0x30, &[0x11, 0x22]))
            .build();
        let scanner = MemoryScanner::new(&mock);
        let pattern = ParsedPattern::parse("11 22").unwrap();

        assert_eq!(addresses(&scanner.scan_range(&pattern, 0x1020, 0x100)), vec![0x1030]);
        assert!(scanner.scan_range(&pattern, 0x1000, 0x20).is_empty());
        assert!(scanner.scan_range(&pattern, 0x9000, 0x20).is_empty());
        assert!(scanner.scan_range(&pattern, 0x1000, 0).is_empty());
    }

    #[test]
    fn test_resolve_displacement() {
        // lea rcx, [rip+0x100] at 0x1000; next instruction at 0x1007
        let mock = MockMemoryBuilder::new()
            .write_bytes(0x1000, &[0x48, 0x8D, 0x0D])
            .write_i32(0x1003, 0x100)
            .write_bytes(0x2000, &[0x48, 0x8B, 0x05])
            .write_i32(0x2003, -0x10)
            .build();
        let scanner = MemoryScanner::new(&mock);

        assert_eq!(scanner.resolve_displacement(0x1000, 3, 7), Some(0x1107));
        assert_eq!(scanner.resolve_displacement(0x2000, 3, 7), Some(0x1FF7));
        assert_eq!(scanner.resolve_displacement(0x9000, 3, 7), None);
    }

    #[test]
    fn test_resolve_signature_with_deref() {
        let mock = MockMemoryBuilder::new()
            .write_bytes(0x1000, &[0x48, 0x8B, 0x05])
            .write_i32(0x1003, 0x0FF9) // 0x1007 + 0xFF9 = 0x2000
            .write_bytes(0x1007, &[0x48, 0x85, 0xC0])
            .write_u64(0x2000, 0xABCD_0000)
            .build();
        let scanner = MemoryScanner::new(&mock);

        let mut signature = CodeSignature {
            pattern: "48 8B 05 ?? ?? ?? ?? 48 85 C0".to_string(),
            instr_offset: 0,
            disp_offset: 3,
            instr_len: 7,
            deref: false,
        };
        assert_eq!(scanner.resolve_signature(&signature).unwrap(), vec![0x2000]);

        signature.deref = true;
        assert_eq!(scanner.resolve_signature(&signature).unwrap(), vec![0xABCD_0000]);

        signature.pattern = "48 GG".to_string();
        assert!(scanner.resolve_signature(&signature).is_err());
    }
}
