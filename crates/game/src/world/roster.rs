use std::fmt;

use crate::event::PowerupType;
use crate::physics::BodyHandle;
use crate::player::PlayerState;

/// Server-local identity of a live entity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Hands out the network ids of bullets and powerups. Both kinds draw from
/// this one counter, so an id names at most one entity per session.
#[derive(Debug, Default)]
pub struct NetIdAllocator {
    next: u32,
}

impl NetIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        let Some(next) = self.next.checked_add(1) else {
            panic!("network id space exhausted");
        };
        self.next = next;
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub entity: EntityId,
    pub slot: u8,
    pub body: BodyHandle,
    pub state: PlayerState,
}

#[derive(Debug, Clone)]
pub struct Bullet {
    pub entity: EntityId,
    pub id: u32,
    pub owner: EntityId,
    pub body: BodyHandle,
    pub lifetime: f32,
}

#[derive(Debug, Clone)]
pub struct Powerup {
    pub entity: EntityId,
    pub id: u32,
    pub kind: PowerupType,
    pub body: BodyHandle,
    pub lifetime: f32,
}

/// Every live player, bullet and powerup.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
    bullets: Vec<Bullet>,
    powerups: Vec<Powerup>,
    next_entity: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    pub fn add_player(&mut self, slot: u8, body: BodyHandle, state: PlayerState) -> EntityId {
        let entity = self.allocate();
        self.players.push(Player {
            entity,
            slot,
            body,
            state,
        });
        entity
    }

    pub fn add_bullet(&mut self, id: u32, owner: EntityId, body: BodyHandle, lifetime: f32) -> EntityId {
        let entity = self.allocate();
        self.bullets.push(Bullet {
            entity,
            id,
            owner,
            body,
            lifetime,
        });
        entity
    }

    pub fn add_powerup(&mut self, id: u32, kind: PowerupType, body: BodyHandle, lifetime: f32) -> EntityId {
        let entity = self.allocate();
        self.powerups.push(Powerup {
            entity,
            id,
            kind,
            body,
            lifetime,
        });
        entity
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn bullets_mut(&mut self) -> &mut [Bullet] {
        &mut self.bullets
    }

    pub fn powerups(&self) -> &[Powerup] {
        &self.powerups
    }

    pub fn powerups_mut(&mut self) -> &mut [Powerup] {
        &mut self.powerups
    }

    pub fn player(&self, entity: EntityId) -> Option<&Player> {
        self.players.iter().find(|p| p.entity == entity)
    }

    pub fn player_mut(&mut self, entity: EntityId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.entity == entity)
    }

    pub fn player_by_body(&self, body: BodyHandle) -> Option<&Player> {
        self.players.iter().find(|p| p.body == body)
    }

    pub fn bullet_by_body(&self, body: BodyHandle) -> Option<&Bullet> {
        self.bullets.iter().find(|b| b.body == body)
    }

    pub fn powerup_by_body(&self, body: BodyHandle) -> Option<&Powerup> {
        self.powerups.iter().find(|p| p.body == body)
    }

    pub fn player_by_body_mut(&mut self, body: BodyHandle) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.body == body)
    }

    pub fn bullet_by_body_mut(&mut self, body: BodyHandle) -> Option<&mut Bullet> {
        self.bullets.iter_mut().find(|b| b.body == body)
    }

    pub fn powerup_by_body_mut(&mut self, body: BodyHandle) -> Option<&mut Powerup> {
        self.powerups.iter_mut().find(|p| p.body == body)
    }

    pub fn remove_player(&mut self, entity: EntityId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.entity == entity)?;
        Some(self.players.remove(index))
    }

    pub fn remove_bullet(&mut self, id: u32) -> Option<Bullet> {
        let index = self.bullets.iter().position(|b| b.id == id)?;
        Some(self.bullets.remove(index))
    }

    pub fn remove_powerup(&mut self, id: u32) -> Option<Powerup> {
        let index = self.powerups.iter().position(|p| p.id == id)?;
        Some(self.powerups.remove(index))
    }

    /// Removes and returns every bullet `pred` selects, keeping order.
    pub fn drain_bullets(&mut self, mut pred: impl FnMut(&Bullet) -> bool) -> Vec<Bullet> {
        let (removed, kept) = std::mem::take(&mut self.bullets)
            .into_iter()
            .partition(|b| pred(b));
        self.bullets = kept;
        removed
    }

    pub fn drain_powerups(&mut self, mut pred: impl FnMut(&Powerup) -> bool) -> Vec<Powerup> {
        let (removed, kept) = std::mem::take(&mut self.powerups)
            .into_iter()
            .partition(|p| pred(p));
        self.powerups = kept;
        removed
    }

    pub fn live_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.state.is_alive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_ids_are_shared_and_monotonic() {
        let mut ids = NetIdAllocator::new();
        let bullet = ids.next_id();
        let powerup = ids.next_id();
        let bullet2 = ids.next_id();

        assert_eq!((bullet, powerup, bullet2), (0, 1, 2));
        assert_eq!(ids.peek(), 3);
    }

    #[test]
    fn test_entity_ids_never_reused() {
        let mut roster = Roster::new();
        let a = roster.add_player(0, BodyHandle(0), PlayerState::new(100));
        roster.remove_player(a);
        let b = roster.add_player(0, BodyHandle(1), PlayerState::new(100));

        assert_ne!(a, b);
        assert!(roster.player(a).is_none());
    }

    #[test]
    fn test_drain_bullets_by_owner() {
        let mut roster = Roster::new();
        let a = roster.add_player(0, BodyHandle(0), PlayerState::new(100));
        let b = roster.add_player(1, BodyHandle(1), PlayerState::new(100));
        roster.add_bullet(10, a, BodyHandle(2), 3.0);
        roster.add_bullet(11, b, BodyHandle(3), 3.0);
        roster.add_bullet(12, a, BodyHandle(4), 3.0);

        let removed = roster.drain_bullets(|bullet| bullet.owner == a);

        assert_eq!(removed.iter().map(|b| b.id).collect::<Vec<_>>(), vec![10, 12]);
        assert_eq!(roster.bullets().len(), 1);
        assert_eq!(roster.bullets()[0].owner, b);
    }
}
