//! Pointer chain probe command.

use anyhow::Result;
use owo_colors::OwoColorize;
use wd42_core::{Config, ReadMemory, read_entities};

use super::hex_utils::format_hex_address;

pub fn run<R: ReadMemory>(reader: &R, config: &Config) -> Result<()> {
    let offsets = config.entity_offsets();
    let chain = &offsets.chain;

    if !chain.is_configured() {
        println!("{}", "No chain configured ([chain] base is zero)".yellow());
        return Ok(());
    }

    println!("Chain: {}", chain);
    println!("  base {}", format_hex_address(chain.base));
    for (i, step) in chain.steps(reader).enumerate() {
        match step {
            Some(step) => println!(
                "  [{}] [{}] = {} -> {}",
                i,
                format_hex_address(step.address),
                format_hex_address(step.pointer),
                format_hex_address(step.next)
            ),
            None => {
                println!("  [{}] {}", i, "null or unreadable".red());
                break;
            }
        }
    }

    match read_entities(reader, &config.oop_config(), &offsets) {
        Ok(list) => println!("{}", list.status().green()),
        Err(e) => println!("{}", e.red()),
    }

    Ok(())
}
