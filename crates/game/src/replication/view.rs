use std::collections::{BTreeMap, HashMap};

use glam::Vec2;

use crate::event::{Direction, GameEvent, PowerupType};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewPlayer {
    pub hp: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub direction: Direction,
    pub powerups: BTreeMap<PowerupType, f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBullet {
    pub owner_slot: u8,
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPowerup {
    pub kind: PowerupType,
    pub position: Vec2,
}

/// A client's mirror of the arena, built only from what the server sends.
///
/// The local slot is the slot of the first spawn received. The `is_self` flag
/// is set on every broadcast spawn, so it says nothing about the receiver and
/// is ignored.
#[derive(Debug, Clone)]
pub struct ClientView {
    local_slot: Option<u8>,
    initial_hp: u32,
    pub players: BTreeMap<u8, ViewPlayer>,
    pub bullets: HashMap<u32, ViewBullet>,
    pub powerups: HashMap<u32, ViewPowerup>,
    pub ready: bool,
    pub game_over: bool,
}

impl ClientView {
    pub fn new(initial_hp: u32) -> Self {
        Self {
            local_slot: None,
            initial_hp,
            players: BTreeMap::new(),
            bullets: HashMap::new(),
            powerups: HashMap::new(),
            ready: false,
            game_over: false,
        }
    }

    pub fn local_slot(&self) -> Option<u8> {
        self.local_slot
    }

    pub fn local_player(&self) -> Option<&ViewPlayer> {
        self.players.get(&self.local_slot?)
    }

    /// Forgets everything, e.g. after losing the server.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_hp);
    }

    pub fn apply(&mut self, event: &GameEvent) {
        match *event {
            GameEvent::Spawn { slot, is_self: _ } => {
                if self.local_slot.is_none() {
                    self.local_slot = Some(slot);
                }
                self.players.insert(
                    slot,
                    ViewPlayer {
                        hp: self.initial_hp,
                        position: Vec2::ZERO,
                        velocity: Vec2::ZERO,
                        direction: Direction::Right,
                        powerups: BTreeMap::new(),
                    },
                );
            }
            GameEvent::Despawn { slot } => {
                self.players.remove(&slot);
                self.bullets.retain(|_, b| b.owner_slot != slot);
            }
            GameEvent::PlayerState {
                slot,
                position,
                velocity,
                direction,
            } => {
                if let Some(player) = self.players.get_mut(&slot) {
                    player.position = position;
                    player.velocity = velocity;
                    player.direction = direction;
                }
            }
            GameEvent::SpawnBullet {
                slot,
                id,
                position,
                velocity,
            } => {
                self.bullets.insert(
                    id,
                    ViewBullet {
                        owner_slot: slot,
                        position,
                        velocity,
                    },
                );
            }
            GameEvent::BulletState {
                id,
                position,
                velocity,
            } => {
                // A late snapshot must not resurrect a despawned bullet.
                if let Some(bullet) = self.bullets.get_mut(&id) {
                    bullet.position = position;
                    bullet.velocity = velocity;
                }
            }
            GameEvent::DespawnBullet { id } => {
                self.bullets.remove(&id);
            }
            GameEvent::SpawnPowerup { kind, id, position } => {
                self.powerups.insert(id, ViewPowerup { kind, position });
            }
            GameEvent::DespawnPowerup { id } => {
                self.powerups.remove(&id);
            }
            GameEvent::SetHp { slot, hp } => {
                if let Some(player) = self.players.get_mut(&slot) {
                    player.hp = hp;
                }
            }
            GameEvent::SetPowerupTimer {
                slot,
                kind,
                seconds,
            } => {
                if let Some(player) = self.players.get_mut(&slot) {
                    player.powerups.insert(kind, seconds);
                }
            }
            GameEvent::ClearPowerupTimer { slot, kind } => {
                if let Some(player) = self.players.get_mut(&slot) {
                    player.powerups.remove(&kind);
                }
            }
            GameEvent::Ready => self.ready = true,
            GameEvent::GameOver => self.game_over = true,
            GameEvent::Input { .. } => {
                log::warn!("ignoring input event from server");
            }
        }
    }

    /// Counts local powerup timers down between server updates.
    pub fn tick(&mut self, dt: f32) {
        for player in self.players.values_mut() {
            for time in player.powerups.values_mut() {
                *time = (*time - dt).max(0.0);
            }
        }
    }
}
