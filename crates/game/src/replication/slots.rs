use glam::{Vec2, Vec3};

use crate::net::PeerId;
use crate::world::EntityId;

/// The live player in a slot together with the peer controlling it. Both are
/// set and cleared as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub entity: EntityId,
    pub peer: PeerId,
}

#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub index: u8,
    pub spawn_position: Vec2,
    pub color: Vec3,
    occupant: Option<Occupant>,
}

impl PlayerSlot {
    pub fn occupant(&self) -> Option<Occupant> {
        self.occupant
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Fixed set of seats a peer can take.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: Vec<PlayerSlot>,
}

const STANDARD_LAYOUT: [(Vec3, Vec2); 4] = [
    (Vec3::new(1.0, 0.8, 0.3), Vec2::new(1.0, 8.0)),
    (Vec3::new(1.0, 0.0, 0.0), Vec2::new(5.0, 3.0)),
    (Vec3::new(0.0, 0.9, 0.0), Vec2::new(7.0, 3.0)),
    (Vec3::new(0.2, 0.2, 1.0), Vec2::new(9.0, 3.0)),
];

impl SlotTable {
    /// Panics on more than 255 slots; slot indices travel as one byte.
    pub fn new(layout: impl IntoIterator<Item = (Vec2, Vec3)>) -> Self {
        let slots: Vec<PlayerSlot> = layout
            .into_iter()
            .enumerate()
            .map(|(i, (spawn_position, color))| {
                let Ok(index) = u8::try_from(i) else {
                    panic!("slot index {i} does not fit in a byte");
                };
                PlayerSlot {
                    index,
                    spawn_position,
                    color,
                    occupant: None,
                }
            })
            .collect();
        Self { slots }
    }

    /// The four seats of the test map, extended along the bottom road when
    /// more are asked for. Positions are in multiples of `unit`.
    pub fn standard(count: usize, unit: f32) -> Self {
        Self::new((0..count).map(|i| match STANDARD_LAYOUT.get(i) {
            Some(&(color, position)) => (position * unit, color),
            None => (Vec2::new(2.0 * i as f32 + 1.0, 3.0) * unit, Vec3::ONE),
        }))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| !s.is_free())
    }

    pub fn first_free(&self) -> Option<u8> {
        self.slots.iter().find(|s| s.is_free()).map(|s| s.index)
    }

    pub fn get(&self, index: u8) -> Option<&PlayerSlot> {
        self.slots.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerSlot> {
        self.slots.iter()
    }

    pub fn occupied(&self) -> impl Iterator<Item = (u8, Occupant)> + '_ {
        self.slots
            .iter()
            .filter_map(|s| s.occupant.map(|o| (s.index, o)))
    }

    pub fn find_by_peer(&self, peer: PeerId) -> Option<u8> {
        self.occupied()
            .find(|(_, o)| o.peer == peer)
            .map(|(index, _)| index)
    }

    pub fn find_by_entity(&self, entity: EntityId) -> Option<u8> {
        self.occupied()
            .find(|(_, o)| o.entity == entity)
            .map(|(index, _)| index)
    }

    /// Panics if the slot is missing or already taken.
    pub fn occupy(&mut self, index: u8, occupant: Occupant) {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            panic!("no player slot {index}");
        };
        assert!(slot.is_free(), "player slot {index} is already occupied");
        slot.occupant = Some(occupant);
    }

    pub fn vacate(&mut self, index: u8) -> Option<Occupant> {
        self.slots.get_mut(index as usize)?.occupant.take()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.occupant = None;
        }
    }
}
