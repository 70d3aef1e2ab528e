//! TOML configuration file.
//!
//! Addresses that may exceed the TOML integer range (`heap_base`, the chain
//! base) are hex strings; malformed ones degrade to zero with a warning
//! rather than failing the whole file.
//!
//! ```toml
//! [oop]
//! compressed = true
//! shift = 3
//! heap_base = "0x0"
//!
//! [chain]
//! base = "0x7FF6A1B2C3D0"
//! offsets = "0x10, 0x48"
//!
//! [layout]
//! pos_x = 0x98
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::esp::{CameraPose, EspStyle};
use crate::heap::{EntityOffsets, OopConfig, PointerChain, ReaderSettings, parse_hex_address};
use crate::memory::layout::{object, oop, timing};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reader: ReaderSection,
    pub oop: OopSection,
    pub chain: ChainSection,
    pub layout: LayoutSection,
    pub camera: CameraPose,
    pub esp: EspStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    /// Delay between worker iterations
    pub interval_ms: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            interval_ms: timing::READ_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OopSection {
    pub compressed: bool,
    pub shift: u32,
    pub heap_base: String,
}

impl Default for OopSection {
    fn default() -> Self {
        Self {
            compressed: true,
            shift: oop::DEFAULT_SHIFT,
            heap_base: "0x0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    pub base: String,
    /// Comma-separated hex offsets
    pub offsets: String,
}

impl ChainSection {
    pub fn from_chain(chain: &PointerChain) -> Self {
        let offsets = chain
            .offsets
            .iter()
            .map(|&o| {
                if o < 0 {
                    format!("-0x{:X}", o.unsigned_abs())
                } else {
                    format!("0x{:X}", o)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            base: format!("0x{:X}", chain.base),
            offsets,
        }
    }

    pub fn to_chain(&self) -> PointerChain {
        PointerChain::parse(&self.base, &self.offsets)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSection {
    pub list_size: u64,
    pub list_array: u64,
    pub array_data: u64,
    pub pos_x: u64,
    pub pos_y: u64,
    pub pos_z: u64,
    pub bounding_box: u64,
    pub box_min_x: u64,
    pub box_min_y: u64,
    pub box_min_z: u64,
    pub box_max_x: u64,
    pub box_max_y: u64,
    pub box_max_z: u64,
    pub max_entities: usize,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            list_size: object::LIST_SIZE,
            list_array: object::LIST_ARRAY,
            array_data: object::ARRAY_DATA,
            pos_x: object::POS_X,
            pos_y: object::POS_Y,
            pos_z: object::POS_Z,
            bounding_box: object::BOUNDING_BOX,
            box_min_x: object::BOX_MIN_X,
            box_min_y: object::BOX_MIN_Y,
            box_min_z: object::BOX_MIN_Z,
            box_max_x: object::BOX_MAX_X,
            box_max_y: object::BOX_MAX_Y,
            box_max_z: object::BOX_MAX_Z,
            max_entities: object::MAX_ENTITIES,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break projection or the reader loop.
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(Error::Config(format!(
                "camera clip planes must satisfy 0 < near < far (near {}, far {})",
                camera.near, camera.far
            )));
        }
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(Error::Config(format!(
                "camera fov must be between 0 and 180 degrees, got {}",
                camera.fov
            )));
        }
        if self.oop.shift >= 64 {
            return Err(Error::Config(format!("oop shift {} is out of range", self.oop.shift)));
        }
        if self.layout.max_entities > object::MAX_ENTITIES_CEILING {
            return Err(Error::Config(format!(
                "layout.max_entities {} exceeds {}",
                self.layout.max_entities,
                object::MAX_ENTITIES_CEILING
            )));
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn oop_config(&self) -> OopConfig {
        let heap_base = parse_hex_address(&self.oop.heap_base).unwrap_or_else(|| {
            warn!("Invalid heap_base '{}', using 0", self.oop.heap_base);
            0
        });
        OopConfig {
            compressed: self.oop.compressed,
            shift: self.oop.shift,
            heap_base,
        }
    }

    pub fn entity_offsets(&self) -> EntityOffsets {
        let l = &self.layout;
        EntityOffsets {
            chain: self.chain.to_chain(),
            list_size: l.list_size,
            list_array: l.list_array,
            array_data: l.array_data,
            pos_x: l.pos_x,
            pos_y: l.pos_y,
            pos_z: l.pos_z,
            bounding_box: l.bounding_box,
            box_min_x: l.box_min_x,
            box_min_y: l.box_min_y,
            box_min_z: l.box_min_z,
            box_max_x: l.box_max_x,
            box_max_y: l.box_max_y,
            box_max_z: l.box_max_z,
            max_entities: l.max_entities,
        }
    }

    pub fn reader_settings(&self) -> ReaderSettings {
        ReaderSettings {
            oop: self.oop_config(),
            offsets: self.entity_offsets(),
            interval: Duration::from_millis(self.reader.interval_ms),
        }
    }
}
