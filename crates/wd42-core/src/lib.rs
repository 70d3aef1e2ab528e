//! # wd42-core
//!
//! External entity reader and ESP overlay core for a JVM game client.
//!
//! This crate provides:
//! - Remote memory access traits and a Windows process reader
//! - Wildcard byte-pattern scanning over a target's address space
//! - Compressed/raw managed reference decoding and pointer chain walking
//! - A background reader publishing entity snapshots
//! - World-to-screen projection and box overlay draw commands
//!
//! ```no_run
//! use std::sync::Arc;
//! use wd42_core::{Config, EntityReader, MemoryReader, ProcessHandle};
//!
//! # fn main() -> wd42_core::Result<()> {
//! let config = Config::load("wd42.toml")?;
//! let process = ProcessHandle::find_and_open("javaw.exe")?;
//!
//! let mut reader = EntityReader::new(config.reader_settings());
//! reader.start(Arc::new(MemoryReader::new(process)))?;
//! reader.set_entity_read_enabled(true);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod esp;
pub mod heap;
pub mod memory;
pub mod scan;
pub mod shutdown;

pub use config::Config;
pub use error::{Error, Result};
pub use esp::{CameraPose, Color, DrawCommand, DrawSink, EspRenderer, EspStyle, Viewport, project};
pub use heap::{
    BoundingBox, CycleError, EntityData, EntityList, EntityOffsets, EntityReader, OopConfig,
    OopDecoder, PointerChain, ReaderSettings, ReaderState, Snapshot, read_entities,
};
pub use memory::{
    DEFAULT_PROCESS_NAME, MemoryReader, MemoryRegion, ProcessHandle, Protection, QueryMemory,
    ReadMemory, WindowRect, find_window_rect,
};
pub use scan::{
    CLASS_SIGNATURES, CodeSignature, MemoryScanner, ParsedPattern, ScanResult, StringFind,
    scan_strings,
};
pub use shutdown::ShutdownSignal;
