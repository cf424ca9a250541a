//! Player lifecycle across the network: who sits in which slot, and keeping
//! every peer's picture of that in step with the server.

mod slots;
mod view;

use crate::event::GameEvent;
use crate::net::{EventSink, PeerId};
use crate::world::{EntityId, World};

pub use slots::{Occupant, PlayerSlot, SlotTable};
pub use view::{ClientView, ViewBullet, ViewPlayer, ViewPowerup};

/// How to find the player being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Despawn {
    Peer(PeerId),
    Entity(EntityId),
}

/// Seats `peer` in the first free slot and tells everyone. The newcomer also
/// learns about every player already seated. With no free slot the peer is
/// dropped and nothing changes.
pub fn spawn_player<S: EventSink + ?Sized>(world: &mut World, peer: PeerId, sink: &mut S) -> Option<u8> {
    let Some(index) = world.slots.first_free() else {
        log::info!("no player slots available, refusing {}", peer);
        sink.disconnect_now(peer);
        return None;
    };

    let spawn_position = world.slots.get(index)?.spawn_position;
    let entity = world.create_player(index, spawn_position);
    world.slots.occupy(index, Occupant { entity, peer });

    log::info!("{} spawned in slot {}", peer, index);
    sink.broadcast(&GameEvent::Spawn {
        slot: index,
        is_self: true,
    });

    let others: Vec<u8> = world
        .slots
        .occupied()
        .map(|(other, _)| other)
        .filter(|&other| other != index)
        .collect();
    for other in others {
        sink.send(
            peer,
            &GameEvent::Spawn {
                slot: other,
                is_self: false,
            },
        );
    }

    Some(index)
}

/// Removes a seated player: announces it, retracts the player's bullets, then
/// frees the slot. Disconnects and deaths both come through here.
pub fn despawn_player<S: EventSink + ?Sized>(world: &mut World, who: Despawn, sink: &mut S) -> Option<u8> {
    let found = match who {
        Despawn::Peer(peer) => world.slots.find_by_peer(peer),
        Despawn::Entity(entity) => world.slots.find_by_entity(entity),
    };
    let Some(index) = found else {
        log::info!("no player found for {:?}", who);
        return None;
    };
    let occupant = world.slots.get(index)?.occupant()?;

    sink.broadcast(&GameEvent::Despawn { slot: index });

    let retracted = world.destroy_bullets_of(occupant.entity);
    if !retracted.is_empty() {
        log::debug!("retracted {} bullets of slot {}", retracted.len(), index);
    }
    world.destroy_player(occupant.entity);
    world.slots.vacate(index);

    log::info!("slot {} freed ({})", index, occupant.peer);
    Some(index)
}
