//! Pattern scan command.

use anyhow::Result;
use owo_colors::OwoColorize;
use wd42_core::{MemoryScanner, ParsedPattern, QueryMemory};

use super::hex_utils::format_hex_address;

/// Results printed before the rest are summarized.
const MAX_LISTED: usize = 64;

/// Treat each hit as a RIP-relative instruction.
pub struct Resolve {
    pub disp_offset: u64,
    pub instr_len: u64,
    pub deref: bool,
}

/// Run the scan command over the whole address space, or over
/// `window = (start, size)` if given.
pub fn run<R: QueryMemory>(
    reader: &R,
    pattern: &str,
    window: Option<(u64, usize)>,
    resolve: Option<Resolve>,
) -> Result<()> {
    let pattern = ParsedPattern::parse(pattern)?;
    let scanner = MemoryScanner::new(reader);

    println!("Scanning for {}...", pattern.bold());
    let hits = match window {
        Some((start, size)) => scanner.scan_range(&pattern, start, size),
        None => scanner.scan_process(&pattern),
    };

    let lines: Vec<String> = hits
        .iter()
        .map(|hit| {
            let address = format_hex_address(hit.address);
            match &resolve {
                Some(r) => {
                    let target = scanner
                        .resolve_displacement(hit.address, r.disp_offset, r.instr_len)
                        .and_then(|t| if r.deref { reader.read_u64(t).ok() } else { Some(t) });
                    match target {
                        Some(t) => format!("{} -> {}", address, format_hex_address(t)),
                        None => format!("{} -> {}", address, "unresolved".red()),
                    }
                }
                None => address,
            }
        })
        .collect();

    println!("{} match(es)", hits.len().green());
    for line in listing(&lines, MAX_LISTED) {
        println!("  {}", line);
    }

    Ok(())
}

/// At most `limit` lines, plus a "... +N more" line when truncated.
pub fn listing(lines: &[String], limit: usize) -> Vec<String> {
    let mut out: Vec<String> = lines.iter().take(limit).cloned().collect();
    if lines.len() > limit {
        out.push(format!("... +{} more", lines.len() - limit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_listing_truncates() {
        let out = listing(&numbered(70), 64);
        assert_eq!(out.len(), 65);
        assert_eq!(out[63], "63");
        assert_eq!(out[64], "... +6 more");
    }

    #[test]
    fn test_listing_short() {
        assert_eq!(listing(&numbered(3), 64), numbered(3));
        assert_eq!(listing(&numbered(64), 64).len(), 64);
        assert!(listing(&[], 64).is_empty());
    }
}
