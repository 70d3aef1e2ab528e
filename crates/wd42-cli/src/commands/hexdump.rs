//! Hexdump command implementation.
//!
//! Shows the value at an address under each common field type, then the raw
//! bytes in traditional hexdump format. Useful when hunting for field offsets.
//!
//! # Output Format
//!
//! ```text
//! 0x7FF6A0001000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use anyhow::Result;
use owo_colors::OwoColorize;
use wd42_core::ReadMemory;

use super::hex_utils::format_hex_address;

/// Run the hexdump command
pub fn run<R: ReadMemory>(reader: &R, address: u64, size: usize) -> Result<()> {
    let bytes = reader.read_partial(address, size)?;

    println!(
        "{} at {} ({} of {} bytes readable)",
        "Hexdump".bold(),
        format_hex_address(address),
        bytes.len(),
        size
    );
    println!();

    for (label, value) in typed_view(&bytes) {
        println!("  {:<4} {}", label.cyan(), value);
    }
    println!();

    for line in hexdump_lines(&bytes, address) {
        println!("{}", line);
    }

    Ok(())
}

/// The leading bytes interpreted as each little-endian field type, for the
/// types that fit.
pub fn typed_view(bytes: &[u8]) -> Vec<(&'static str, String)> {
    let mut view = Vec::new();

    if let Some(&b) = bytes.first() {
        view.push(("u8", b.to_string()));
    }
    if let Some(b) = leading::<2>(bytes) {
        view.push(("u16", u16::from_le_bytes(b).to_string()));
    }
    if let Some(b) = leading::<4>(bytes) {
        view.push(("i32", i32::from_le_bytes(b).to_string()));
        view.push(("u32", format!("0x{:X}", u32::from_le_bytes(b))));
        view.push(("f32", f32::from_le_bytes(b).to_string()));
    }
    if let Some(b) = leading::<8>(bytes) {
        view.push(("i64", i64::from_le_bytes(b).to_string()));
        view.push(("ptr", format_hex_address(u64::from_le_bytes(b))));
        view.push(("f64", f64::from_le_bytes(b).to_string()));
    }

    view
}

/// Format `bytes` as 16-byte rows labelled with absolute addresses.
pub fn hexdump_lines(bytes: &[u8], address: u64) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("0x{:X}: ", address + (i * 16) as u64);

            for j in 0..16 {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02X} ", byte)),
                    None => line.push_str("   "),
                }
            }

            line.push_str(" |");
            for byte in chunk {
                if (0x20..0x7F).contains(byte) {
                    line.push(*byte as char);
                } else {
                    line.push('.');
                }
            }
            for _ in chunk.len()..16 {
                line.push(' ');
            }
            line.push('|');
            line
        })
        .collect()
}

fn leading<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}
