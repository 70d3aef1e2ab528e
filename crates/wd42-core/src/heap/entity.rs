//! One pass over the entity list: chain -> list -> backing array -> entities.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heap::{EntityOffsets, OopConfig, OopDecoder};
use crate::memory::ReadMemory;
use crate::memory::layout::{object, world};

/// Axis-aligned bounding box read from the entity's box object.
///
/// Fields that could not be read stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl BoundingBox {
    /// True if the box has extent on at least one axis.
    pub fn has_extent(&self) -> bool {
        self.max_x != self.min_x || self.max_y != self.min_y || self.max_z != self.min_z
    }

    pub fn min(&self) -> DVec3 {
        DVec3::new(self.min_x, self.min_y, self.min_z)
    }

    pub fn max(&self) -> DVec3 {
        DVec3::new(self.max_x, self.max_y, self.max_z)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    /// Slot in the backing array
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub bounding_box: BoundingBox,
    /// Position was read and lies within world bounds
    pub valid: bool,
}

impl EntityData {
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// True if `(x, y, z)` is finite and inside the playable world.
pub fn is_plausible_position(x: f64, y: f64, z: f64) -> bool {
    x.is_finite()
        && y.is_finite()
        && z.is_finite()
        && x.abs() < world::MAX_HORIZONTAL
        && z.abs() < world::MAX_HORIZONTAL
        && y.abs() < world::MAX_VERTICAL
}

/// Failures that leave nothing meaningful to read for the rest of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("Chain resolved to null")]
    ChainUnresolved,

    #[error("Failed to read entity count at 0x{0:X}")]
    CountUnreadable(u64),

    #[error("Entity array ref is null at 0x{0:X}")]
    ArrayRefNull(u64),
}

/// Result of one successful read cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityList {
    pub entities: Vec<EntityData>,
    /// Clamped list size (slots visited, including null ones)
    pub count: usize,
    pub list_address: u64,
}

impl EntityList {
    pub fn valid_count(&self) -> usize {
        self.entities.iter().filter(|e| e.valid).count()
    }

    pub fn status(&self) -> String {
        format!(
            "Reading {} entities ({} valid) @ 0x{:X}",
            self.count,
            self.valid_count(),
            self.list_address
        )
    }
}

/// Run one entity read cycle.
///
/// Only an unresolved chain, an unreadable count or a null backing array
/// abort the cycle. Every other failed read degrades the affected field: a
/// null element is skipped, an unreadable position leaves the entity
/// invalid, and unreadable box fields stay zero.
pub fn read_entities<R: ReadMemory>(
    reader: &R,
    oop: &OopConfig,
    offsets: &EntityOffsets,
) -> Result<EntityList, CycleError> {
    let list_address = offsets
        .chain
        .walk(reader)
        .ok_or(CycleError::ChainUnresolved)?;

    let count_address = list_address.wrapping_add(offsets.list_size);
    let raw_count = reader
        .read_i32(count_address)
        .map_err(|_| CycleError::CountUnreadable(count_address))?;
    let count = offsets.clamp_count(raw_count);

    let decoder = OopDecoder::new(reader, *oop);
    let array_field = list_address.wrapping_add(offsets.list_array);
    let array = decoder
        .decode(array_field)
        .ok_or(CycleError::ArrayRefNull(array_field))?;

    let data = array.wrapping_add(offsets.array_data);
    let ref_size = oop.reference_size();
    let mut entities = Vec::with_capacity(count.min(object::MAX_ENTITIES));

    for index in 0..count {
        let element = data.wrapping_add(index as u64 * ref_size);
        let Some(entity) = decoder.decode(element) else {
            continue;
        };
        entities.push(read_entity(reader, &decoder, offsets, index, entity));
    }

    Ok(EntityList {
        entities,
        count,
        list_address,
    })
}

fn read_entity<R: ReadMemory>(
    reader: &R,
    decoder: &OopDecoder<'_, R>,
    offsets: &EntityOffsets,
    index: usize,
    entity: u64,
) -> EntityData {
    let field = |offset: u64| reader.read_f64(entity.wrapping_add(offset)).ok();
    let mut data = EntityData {
        index,
        ..EntityData::default()
    };

    if let (Some(x), Some(y), Some(z)) = (
        field(offsets.pos_x),
        field(offsets.pos_y),
        field(offsets.pos_z),
    ) {
        data.x = x;
        data.y = y;
        data.z = z;
        data.valid = is_plausible_position(x, y, z);
    }

    if let Some(bb) = decoder.decode(entity.wrapping_add(offsets.bounding_box)) {
        let read = |offset: u64, slot: &mut f64| {
            if let Ok(value) = reader.read_f64(bb.wrapping_add(offset)) {
                *slot = value;
            }
        };
        let b = &mut data.bounding_box;
        read(offsets.box_min_x, &mut b.min_x);
        read(offsets.box_min_y, &mut b.min_y);
        read(offsets.box_min_z, &mut b.min_z);
        read(offsets.box_max_x, &mut b.max_x);
        read(offsets.box_max_y, &mut b.max_y);
        read(offsets.box_max_z, &mut b.max_z);
    }

    data
}
