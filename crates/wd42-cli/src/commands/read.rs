//! Continuous entity read command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::warn;
use wd42_core::{Config, EntityReader, QueryMemory, Snapshot};

use super::hex_utils::format_hex_address;
use super::shutdown_on_ctrlc;

const PRINT_INTERVAL: Duration = Duration::from_secs(1);

pub fn run<R>(reader: R, config: &Config, json: bool, strings: bool) -> Result<()>
where
    R: QueryMemory + Send + Sync + 'static,
{
    let shutdown = shutdown_on_ctrlc()?;
    let settings = config.reader_settings();
    if !settings.offsets.chain.is_configured() {
        warn!("No chain configured in [chain], entity reads stay idle");
    }

    let mut entity_reader = EntityReader::new(settings);
    entity_reader.start(Arc::new(reader))?;
    entity_reader.set_entity_read_enabled(true);
    if strings {
        entity_reader.request_string_scan();
    }

    if !json {
        println!("Reading entities... (Ctrl+C to stop)");
    }
    while !shutdown.wait(PRINT_INTERVAL) {
        let snapshot = entity_reader.snapshot();
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            print_snapshot(&snapshot);
        }
    }

    entity_reader.stop();
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("{}", snapshot.status.bold());
    for e in snapshot.entities.iter().filter(|e| e.valid) {
        println!(
            "  #{:<3} X:{:>10.2} Y:{:>8.2} Z:{:>10.2}",
            e.index.green(),
            e.x,
            e.y,
            e.z
        );
    }
    for find in &snapshot.string_finds {
        println!("  {} {}", format_hex_address(find.address).cyan(), find.text);
    }
    println!();
}
