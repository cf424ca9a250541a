mod world;

use bitflags::bitflags;
use glam::Vec2;

pub use world::PhysicsWorld;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionCategory: u16 {
        const PLAYER = 1 << 0;
        const BULLET = 1 << 1;
        const POWERUP = 1 << 2;
        const TILE = 1 << 3;
        const TILE_WALL = 1 << 4;
        const TILE_VOID = 1 << 5;
        const WORLD_BOUNDS = 1 << 6;
    }
}

impl CollisionCategory {
    /// What each moving category collides with.
    pub fn default_mask(self) -> CollisionCategory {
        if self.contains(Self::PLAYER) {
            Self::BULLET | Self::POWERUP | Self::TILE_WALL | Self::TILE_VOID | Self::WORLD_BOUNDS
        } else if self.contains(Self::BULLET) {
            Self::PLAYER | Self::TILE_WALL | Self::WORLD_BOUNDS
        } else if self.contains(Self::POWERUP) {
            Self::PLAYER
        } else {
            Self::empty()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) u32);

/// A moving circle.
#[derive(Debug, Clone, Copy)]
pub struct CircleBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub category: CollisionCategory,
    pub mask: CollisionCategory,
    /// Reflect off blockers instead of sliding along them.
    pub restitution: bool,
    /// Overlaps are reported but never pushed apart.
    pub sensor: bool,
}

impl CircleBody {
    pub fn new(position: Vec2, radius: f32, category: CollisionCategory) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            category,
            mask: category.default_mask(),
            restitution: false,
            sensor: false,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn bouncy(mut self) -> Self {
        self.restitution = true;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }
}

/// A static axis-aligned box.
#[derive(Debug, Clone, Copy)]
pub struct BoxBody {
    pub center: Vec2,
    pub half_extents: Vec2,
    pub category: CollisionCategory,
    pub mask: CollisionCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collider {
    pub body: BodyHandle,
    pub category: CollisionCategory,
}

/// Two bodies that started touching during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: Collider,
    pub b: Collider,
}

impl Contact {
    /// Returns the contact ordered as `(first, second)` when one side has
    /// `first` and the other `second`.
    pub fn pair(&self, first: CollisionCategory, second: CollisionCategory) -> Option<(BodyHandle, BodyHandle)> {
        if self.a.category.intersects(first) && self.b.category.intersects(second) {
            Some((self.a.body, self.b.body))
        } else if self.b.category.intersects(first) && self.a.category.intersects(second) {
            Some((self.b.body, self.a.body))
        } else {
            None
        }
    }
}

/// The rigid-body simulation the arena runs on. Two bodies interact only when
/// each one's mask includes the other's category.
pub trait Physics {
    fn add_circle(&mut self, body: CircleBody) -> BodyHandle;

    fn add_box(&mut self, body: BoxBody) -> BodyHandle;

    fn remove(&mut self, body: BodyHandle);

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2);

    fn position(&self, body: BodyHandle) -> Option<Vec2>;

    fn velocity(&self, body: BodyHandle) -> Option<Vec2>;

    /// Advances by `dt` seconds and returns the contacts that began.
    fn step(&mut self, dt: f32) -> Vec<Contact>;

    /// Blocks the rectangle `[0, size]` with walls of category
    /// `WORLD_BOUNDS`.
    fn set_world_bounds(&mut self, size: Vec2) {
        const THICKNESS: f32 = 64.0;
        let half = size * 0.5;
        let mask = CollisionCategory::PLAYER | CollisionCategory::BULLET;

        let walls = [
            (Vec2::new(-THICKNESS, half.y), Vec2::new(THICKNESS, half.y + THICKNESS)),
            (Vec2::new(size.x + THICKNESS, half.y), Vec2::new(THICKNESS, half.y + THICKNESS)),
            (Vec2::new(half.x, -THICKNESS), Vec2::new(half.x + THICKNESS, THICKNESS)),
            (Vec2::new(half.x, size.y + THICKNESS), Vec2::new(half.x + THICKNESS, THICKNESS)),
        ];

        for (center, half_extents) in walls {
            self.add_box(BoxBody {
                center,
                half_extents,
                category: CollisionCategory::WORLD_BOUNDS,
                mask,
            });
        }
    }
}
