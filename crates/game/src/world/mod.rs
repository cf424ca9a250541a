mod roster;

use glam::Vec2;

use crate::event::PowerupType;
use crate::map::ArenaMap;
use crate::physics::{BodyHandle, CircleBody, CollisionCategory, Physics, PhysicsWorld};
use crate::player::{ArenaRules, PlayerController, PlayerState, Shot};
use crate::replication::SlotTable;

pub use roster::{Bullet, EntityId, NetIdAllocator, Player, Powerup, Roster};

/// Everything the server simulates: the map, the bodies moving over it, and
/// the entities and player slots that own those bodies.
pub struct World {
    pub map: ArenaMap,
    pub physics: Box<dyn Physics>,
    pub roster: Roster,
    pub slots: SlotTable,
    pub ids: NetIdAllocator,
    pub controller: PlayerController,
}

impl World {
    pub fn new(map: ArenaMap, mut physics: Box<dyn Physics>, slots: SlotTable, rules: ArenaRules) -> Self {
        map.build_colliders(physics.as_mut());

        Self {
            map,
            physics,
            roster: Roster::new(),
            slots,
            ids: NetIdAllocator::new(),
            controller: PlayerController::new(rules),
        }
    }

    /// The test map on the bundled rapier world.
    pub fn testing_ground(slot_count: usize, rules: ArenaRules) -> Self {
        let slots = SlotTable::standard(slot_count, rules.player_radius);
        Self::new(
            ArenaMap::testing_ground(),
            Box::new(PhysicsWorld::new()),
            slots,
            rules,
        )
    }

    pub fn rules(&self) -> &ArenaRules {
        self.controller.rules()
    }

    pub fn create_player(&mut self, slot: u8, position: Vec2) -> EntityId {
        let rules = self.controller.rules();
        let body = self.physics.add_circle(CircleBody::new(
            position,
            rules.player_radius,
            CollisionCategory::PLAYER,
        ));
        self.roster
            .add_player(slot, body, PlayerState::new(rules.player_hp))
    }

    pub fn destroy_player(&mut self, entity: EntityId) -> Option<Player> {
        let player = self.roster.remove_player(entity)?;
        self.physics.remove(player.body);
        Some(player)
    }

    /// Spawns a bullet for `owner` and returns its network id.
    pub fn create_bullet(&mut self, owner: EntityId, shot: Shot) -> u32 {
        let rules = self.controller.rules();
        // Bullets always reflect; whether a wall hit ends them is a rule.
        let body = self.physics.add_circle(
            CircleBody::new(shot.position, rules.bullet_radius, CollisionCategory::BULLET)
                .with_velocity(shot.velocity)
                .bouncy(),
        );
        let id = self.ids.next_id();
        self.roster.add_bullet(id, owner, body, rules.bullet_lifetime);
        id
    }

    pub fn destroy_bullet(&mut self, id: u32) -> Option<Bullet> {
        let bullet = self.roster.remove_bullet(id)?;
        self.physics.remove(bullet.body);
        Some(bullet)
    }

    /// Removes every bullet fired by `owner`.
    pub fn destroy_bullets_of(&mut self, owner: EntityId) -> Vec<Bullet> {
        let removed = self.roster.drain_bullets(|b| b.owner == owner);
        for bullet in &removed {
            self.physics.remove(bullet.body);
        }
        removed
    }

    pub fn create_powerup(&mut self, kind: PowerupType, position: Vec2) -> u32 {
        let rules = self.controller.rules();
        let body = self.physics.add_circle(
            CircleBody::new(position, rules.powerup_radius, CollisionCategory::POWERUP).sensor(),
        );
        let id = self.ids.next_id();
        self.roster
            .add_powerup(id, kind, body, rules.powerup_lifetime);
        id
    }

    pub fn destroy_powerup(&mut self, id: u32) -> Option<Powerup> {
        let powerup = self.roster.remove_powerup(id)?;
        self.physics.remove(powerup.body);
        Some(powerup)
    }

    pub fn position_of(&self, body: BodyHandle) -> Vec2 {
        self.physics.position(body).unwrap_or(Vec2::ZERO)
    }

    pub fn velocity_of(&self, body: BodyHandle) -> Vec2 {
        self.physics.velocity(body).unwrap_or(Vec2::ZERO)
    }

    pub fn slot_of(&self, entity: EntityId) -> Option<u8> {
        self.roster.player(entity).map(|p| p.slot)
    }
}
