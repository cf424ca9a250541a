use std::collections::BTreeSet;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::{Direction, GameEvent, PowerupType};
use crate::net::{EventSink, PeerId};
use crate::physics::{BodyHandle, CollisionCategory, Contact};
use crate::player::PlayerController;
use crate::replication::{self, Despawn};
use crate::world::{EntityId, Roster, World};

/// Applies one step's contacts to the roster. Lives only for that step.
struct ContactResolver<'a> {
    roster: &'a mut Roster,
    controller: &'a PlayerController,
    hp_changed: BTreeSet<EntityId>,
    timers_set: Vec<(EntityId, PowerupType)>,
}

impl<'a> ContactResolver<'a> {
    fn new(roster: &'a mut Roster, controller: &'a PlayerController) -> Self {
        Self {
            roster,
            controller,
            hp_changed: BTreeSet::new(),
            timers_set: Vec::new(),
        }
    }

    fn resolve(&mut self, contact: &Contact) {
        let blockers = CollisionCategory::TILE_WALL | CollisionCategory::WORLD_BOUNDS;

        if let Some((player, bullet)) = contact.pair(CollisionCategory::PLAYER, CollisionCategory::BULLET) {
            self.player_bullet(player, bullet);
        } else if let Some((player, powerup)) = contact.pair(CollisionCategory::PLAYER, CollisionCategory::POWERUP) {
            self.player_powerup(player, powerup);
        } else if let Some((bullet, _)) = contact.pair(CollisionCategory::BULLET, blockers) {
            self.bullet_blocked(bullet);
        }
    }

    fn player_bullet(&mut self, player: BodyHandle, bullet: BodyHandle) {
        let Some(target) = self.roster.player_by_body(player).map(|p| p.entity) else {
            return;
        };
        let Some((owner, lifetime)) = self.roster.bullet_by_body(bullet).map(|b| (b.owner, b.lifetime)) else {
            return;
        };
        // Spent bullets and the shooter's own bullets do nothing.
        if owner == target || lifetime <= 0.0 {
            return;
        }

        let damage = match self.roster.player(owner) {
            Some(shooter) => self.controller.bullet_damage(&shooter.state),
            None => self.controller.rules().bullet_damage,
        };
        if let Some(target) = self.roster.player_mut(target) {
            target.state.hp = target.state.hp.saturating_sub(damage);
            self.hp_changed.insert(target.entity);
        }
        if let Some(bullet) = self.roster.bullet_by_body_mut(bullet) {
            bullet.lifetime = 0.0;
        }
    }

    fn player_powerup(&mut self, player: BodyHandle, powerup: BodyHandle) {
        let Some((kind, lifetime)) = self.roster.powerup_by_body(powerup).map(|p| (p.kind, p.lifetime)) else {
            return;
        };
        if lifetime <= 0.0 {
            return;
        }

        let duration = self.controller.rules().powerup_duration;
        let Some(player) = self.roster.player_by_body_mut(player) else {
            return;
        };
        player.state.powerups.insert(kind, duration);
        self.timers_set.push((player.entity, kind));

        if let Some(powerup) = self.roster.powerup_by_body_mut(powerup) {
            powerup.lifetime = 0.0;
        }
    }

    fn bullet_blocked(&mut self, bullet: BodyHandle) {
        let Some(owner) = self.roster.bullet_by_body(bullet).map(|b| b.owner) else {
            return;
        };
        let bounces = self
            .roster
            .player(owner)
            .is_some_and(|p| p.state.has_powerup(PowerupType::BulletBounce));
        if bounces {
            return;
        }
        if let Some(bullet) = self.roster.bullet_by_body_mut(bullet) {
            bullet.lifetime = 0.0;
        }
    }
}

/// The authoritative game: a [`World`] plus the server-owned random source
/// and timers that drive it.
pub struct Arena {
    pub world: World,
    rng: StdRng,
    powerup_timer: f32,
}

impl Arena {
    pub fn new(world: World, seed: u64) -> Self {
        Self {
            world,
            rng: StdRng::seed_from_u64(seed),
            powerup_timer: 0.0,
        }
    }

    /// Routes a peer's input to its player. Returns false when the peer holds
    /// no slot, e.g. after its player died.
    pub fn apply_input(&mut self, peer: PeerId, moving: bool, direction: Direction, firing: bool) -> bool {
        let Some(occupant) = self
            .world
            .slots
            .find_by_peer(peer)
            .and_then(|index| self.world.slots.get(index))
            .and_then(|slot| slot.occupant())
        else {
            return false;
        };

        match self.world.roster.player_mut(occupant.entity) {
            Some(player) => {
                player.state.apply_input(moving, direction, firing);
                true
            }
            None => false,
        }
    }

    pub fn live_player_count(&self) -> usize {
        self.world.roster.live_player_count()
    }

    /// At most one player left standing in a game that had more than one.
    pub fn is_game_over(&self) -> bool {
        self.world.slots.len() > 1 && self.live_player_count() <= 1
    }

    /// Advances the game by `dt` seconds and broadcasts everything that
    /// changed.
    pub fn step<S: EventSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        self.move_and_fire(dt, sink);

        let contacts = self.world.physics.step(dt);
        let (hp_changed, timers_set) = {
            let mut resolver = ContactResolver::new(&mut self.world.roster, &self.world.controller);
            for contact in &contacts {
                resolver.resolve(contact);
            }
            (resolver.hp_changed, resolver.timers_set)
        };
        let duration = self.world.rules().powerup_duration;
        for (entity, kind) in timers_set {
            if let Some(slot) = self.world.slot_of(entity) {
                sink.broadcast(&GameEvent::SetPowerupTimer {
                    slot,
                    kind,
                    seconds: duration,
                });
            }
        }

        self.expire_bullets(dt, sink);
        self.apply_heals(hp_changed, sink);
        self.tick_powerup_timers(dt, sink);
        self.expire_powerups(dt, sink);
        self.remove_dead(sink);
        self.spawn_powerups(dt, sink);
    }

    fn move_and_fire<S: EventSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        let world = &mut self.world;
        let mut shots = Vec::new();

        for player in world.roster.players_mut() {
            world
                .physics
                .set_velocity(player.body, world.controller.velocity(&player.state));

            let position = world.physics.position(player.body).unwrap_or(Vec2::ZERO);
            if let Some(shot) = world.controller.tick_weapon(&mut player.state, position, dt) {
                shots.push((player.entity, player.slot, shot));
            }
        }

        for (owner, slot, shot) in shots {
            let id = world.create_bullet(owner, shot);
            sink.broadcast(&GameEvent::SpawnBullet {
                slot,
                id,
                position: shot.position,
                velocity: shot.velocity,
            });
        }
    }

    fn expire_bullets<S: EventSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        for bullet in self.world.roster.bullets_mut() {
            bullet.lifetime -= dt;
        }
        for bullet in self.world.roster.drain_bullets(|b| b.lifetime <= 0.0) {
            self.world.physics.remove(bullet.body);
            sink.broadcast(&GameEvent::DespawnBullet { id: bullet.id });
        }
    }

    fn apply_heals<S: EventSink + ?Sized>(&mut self, mut hp_changed: BTreeSet<EntityId>, sink: &mut S) {
        let world = &mut self.world;
        for player in world.roster.players_mut() {
            if world.controller.apply_heal(&mut player.state) {
                hp_changed.insert(player.entity);
            }
        }

        for entity in hp_changed {
            if let Some(player) = world.roster.player(entity) {
                sink.broadcast(&GameEvent::SetHp {
                    slot: player.slot,
                    hp: player.state.hp,
                });
            }
        }
    }

    fn tick_powerup_timers<S: EventSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        for player in self.world.roster.players_mut() {
            for kind in player.state.tick_powerups(dt) {
                sink.broadcast(&GameEvent::ClearPowerupTimer {
                    slot: player.slot,
                    kind,
                });
            }
        }
    }

    fn expire_powerups<S: EventSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        for powerup in self.world.roster.powerups_mut() {
            powerup.lifetime -= dt;
        }
        for powerup in self.world.roster.drain_powerups(|p| p.lifetime <= 0.0) {
            self.world.physics.remove(powerup.body);
            sink.broadcast(&GameEvent::DespawnPowerup { id: powerup.id });
        }
    }

    fn remove_dead<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        let dead: Vec<EntityId> = self
            .world
            .roster
            .players()
            .iter()
            .filter(|p| !p.state.is_alive())
            .map(|p| p.entity)
            .collect();

        for entity in dead {
            if let Some(slot) = replication::despawn_player(&mut self.world, Despawn::Entity(entity), sink) {
                log::info!("player in slot {} died", slot);
            }
        }
    }

    fn spawn_powerups<S: EventSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        let interval = self.world.rules().powerup_spawn_interval;
        self.powerup_timer += dt;
        if self.powerup_timer < interval {
            return;
        }
        self.powerup_timer -= interval;

        let open = self.world.map.open_tiles();
        if open.is_empty() {
            return;
        }
        let position = open[self.rng.gen_range(0..open.len())];
        let kind = PowerupType::ALL[self.rng.gen_range(0..PowerupType::ALL.len())];

        let id = self.world.create_powerup(kind, position);
        log::debug!("powerup {} ({}) at {}", id, kind.name(), position);
        sink.broadcast(&GameEvent::SpawnPowerup { kind, id, position });
    }

    /// Current position and velocity of every player and bullet.
    pub fn broadcast_snapshots<S: EventSink + ?Sized>(&self, sink: &mut S) {
        for player in self.world.roster.players() {
            sink.broadcast(&GameEvent::PlayerState {
                slot: player.slot,
                position: self.world.position_of(player.body),
                velocity: self.world.velocity_of(player.body),
                direction: player.state.direction,
            });
        }
        for bullet in self.world.roster.bullets() {
            sink.broadcast(&GameEvent::BulletState {
                id: bullet.id,
                position: self.world.position_of(bullet.body),
                velocity: self.world.velocity_of(bullet.body),
            });
        }
    }
}
