//! RIP-relative operand resolution command.

use anyhow::{Result, bail};
use wd42_core::{MemoryScanner, QueryMemory};

use super::hex_utils::format_hex_address;

pub fn run<R: QueryMemory>(reader: &R, address: u64, disp_offset: u64, instr_len: u64) -> Result<()> {
    let scanner = MemoryScanner::new(reader);
    let Some(target) = scanner.resolve_displacement(address, disp_offset, instr_len) else {
        bail!(
            "Could not read displacement at {}",
            format_hex_address(address.wrapping_add(disp_offset))
        );
    };

    let displacement = target.wrapping_sub(address.wrapping_add(instr_len)) as i64;
    let sign = if displacement < 0 { "-" } else { "+" };
    println!("Instruction: {}", format_hex_address(address));
    println!("Displacement: {}0x{:X}", sign, displacement.unsigned_abs());
    println!("Target: {}", format_hex_address(target));

    if let Ok(value) = reader.read_u64(target) {
        println!("[Target]: {}", format_hex_address(value));
    }

    Ok(())
}
