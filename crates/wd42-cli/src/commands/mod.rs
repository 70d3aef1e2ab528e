//! CLI command implementations.

pub mod chain;
pub mod esp;
pub mod hex_utils;
pub mod hexdump;
pub mod read;
pub mod rip;
pub mod scan;
pub mod strings;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use wd42_core::{MemoryReader, ProcessHandle, ShutdownSignal};

/// Process selection from the global flags.
pub struct Target<'a> {
    pub pid: Option<u32>,
    pub process: &'a str,
}

impl Target<'_> {
    pub fn open(&self) -> Result<MemoryReader> {
        let process = match self.pid {
            Some(pid) => ProcessHandle::open(pid)?,
            None => ProcessHandle::find_and_open(self.process)?,
        };
        info!(
            "Attached to {} (pid {}, base: {:#x})",
            process.name, process.pid, process.base_address
        );
        Ok(MemoryReader::new(process))
    }
}

/// Signal triggered by Ctrl+C. Install at most once per process.
pub fn shutdown_on_ctrlc() -> Result<Arc<ShutdownSignal>> {
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;
    Ok(shutdown)
}
