//! Reading entity data out of the target's managed heap.

mod chain;
mod entity;
mod offsets;
mod oop;
mod reader;

pub use chain::{ChainStep, PointerChain, parse_hex_address};
pub use entity::{BoundingBox, CycleError, EntityData, EntityList, is_plausible_position, read_entities};
pub use offsets::EntityOffsets;
pub use oop::{OopConfig, OopDecoder};
pub use reader::{EntityReader, ReaderSettings, ReaderState, Snapshot};
