//! Class-name string scan command.

use anyhow::Result;
use owo_colors::OwoColorize;
use wd42_core::{CLASS_SIGNATURES, MemoryScanner, QueryMemory, scan_strings};

use super::hex_utils::format_hex_address;
use super::shutdown_on_ctrlc;

pub fn run<R: QueryMemory>(reader: &R) -> Result<()> {
    let shutdown = shutdown_on_ctrlc()?;
    let scanner = MemoryScanner::new(reader).with_cancel(shutdown.as_atomic());
    let finds = scan_strings(&scanner, CLASS_SIGNATURES);

    if finds.is_empty() {
        println!("{}", "No class-name strings found".yellow());
        return Ok(());
    }

    for find in &finds {
        println!("{}  {}", format_hex_address(find.address).cyan(), find.text);
    }
    println!("{} hit(s)", finds.len());

    Ok(())
}
