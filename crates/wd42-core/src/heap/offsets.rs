use serde::{Deserialize, Serialize};

use crate::heap::PointerChain;
use crate::memory::layout::object;

/// Object layout of the entity list and entity objects, plus the chain that
/// leads to the list.
///
/// These depend on the game version and are supplied by configuration. Wrong
/// values produce zero or garbage reads, never a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityOffsets {
    pub chain: PointerChain,

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

impl Default for EntityOffsets {
    fn default() -> Self {
        Self {
            chain: PointerChain::default(),
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

impl EntityOffsets {
    /// Clamp a raw list size into `0..=max_entities`. The cap itself never
    /// exceeds [`object::MAX_ENTITIES_CEILING`].
    pub fn clamp_count(&self, raw: i32) -> usize {
        usize::try_from(raw)
            .unwrap_or(0)
            .min(self.max_entities.min(object::MAX_ENTITIES_CEILING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_count() {
        let offsets = EntityOffsets::default();
        assert_eq!(offsets.clamp_count(-5), 0);
        assert_eq!(offsets.clamp_count(0), 0);
        assert_eq!(offsets.clamp_count(3), 3);
        assert_eq!(offsets.clamp_count(10_000), 256);
        assert_eq!(offsets.clamp_count(i32::MIN), 0);
    }

    #[test]
    fn test_clamp_count_respects_ceiling() {
        let offsets = EntityOffsets {
            max_entities: usize::MAX,
            ..EntityOffsets::default()
        };
        assert_eq!(offsets.clamp_count(i32::MAX), object::MAX_ENTITIES_CEILING);
        assert_eq!(offsets.clamp_count(1000), 1000);
    }

    #[test]
    fn test_default_has_no_chain() {
        assert!(!EntityOffsets::default().chain.is_configured());
    }
}
