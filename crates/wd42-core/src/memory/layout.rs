//! Memory layout constants for the target's managed heap
//!
//! Object offsets here are starting points for a 64-bit HotSpot JVM with
//! compressed oops. They differ between game versions and are expected to be
//! overridden through configuration.

/// Plausible world coordinate bounds for an entity position
pub mod world {
    /// Horizontal (x/z) coordinates stay strictly within +/- this value
    pub const MAX_HORIZONTAL: f64 = 3.0e7;

    /// Vertical (y) coordinates stay strictly within +/- this value
    pub const MAX_VERTICAL: f64 = 1000.0;
}

/// Managed reference (oop) encoding defaults
pub mod oop {
    /// HotSpot shifts compressed references by the object alignment (8 bytes)
    pub const DEFAULT_SHIFT: u32 = 3;

    pub const COMPRESSED_REF_SIZE: u64 = 4;
    pub const RAW_REF_SIZE: u64 = 8;
}

/// Default object field offsets
pub mod object {
    // Entity list (ArrayList): int size, oop elementData
    pub const LIST_SIZE: u64 = 0x10;
    pub const LIST_ARRAY: u64 = 0x14;

    /// Object[] header: mark (8) + klass (4) + length (4)
    pub const ARRAY_DATA: u64 = 0x10;

    // Entity position doubles
    pub const POS_X: u64 = 0x98;
    pub const POS_Y: u64 = 0xA0;
    pub const POS_Z: u64 = 0xA8;

    /// Entity -> Box reference
    pub const BOUNDING_BOX: u64 = 0xB0;

    // Box doubles
    pub const BOX_MIN_X: u64 = 0x10;
    pub const BOX_MIN_Y: u64 = 0x18;
    pub const BOX_MIN_Z: u64 = 0x20;
    pub const BOX_MAX_X: u64 = 0x28;
    pub const BOX_MAX_Y: u64 = 0x30;
    pub const BOX_MAX_Z: u64 = 0x38;

    /// Safety cap on entities read per cycle
    pub const MAX_ENTITIES: usize = 256;

    /// Largest cap configuration may set
    pub const MAX_ENTITIES_CEILING: usize = 1 << 16;
}

/// Timing constants for the background reader
pub mod timing {
    /// Interval between reader loop iterations (ms)
    pub const READ_INTERVAL_MS: u64 = 50;

    /// Cycles between periodic entity dumps in the debug log (~1s at the default interval)
    pub const LOG_EVERY_CYCLES: u32 = 20;
}

/// Address-space scan limits
pub mod scan {
    /// Regions larger than this are read in chunks
    pub const CHUNK_SIZE: usize = 16 * 1024 * 1024;
}
