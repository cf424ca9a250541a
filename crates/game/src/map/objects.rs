use glam::Vec2;

use crate::physics::CollisionCategory;

pub const TILE_RADIUS: f32 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Grass,
    RoadEastWest,
    RoadNorthSouth,
    RoadCross,
    Building,
    Rubble,
    Water,
}

impl TileKind {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        Some(match symbol {
            ' ' => TileKind::Grass,
            '-' => TileKind::RoadEastWest,
            '|' => TileKind::RoadNorthSouth,
            '+' => TileKind::RoadCross,
            '#' => TileKind::Building,
            'x' => TileKind::Rubble,
            '~' => TileKind::Water,
            _ => return None,
        })
    }

    pub fn category(self) -> CollisionCategory {
        match self {
            TileKind::Building => CollisionCategory::TILE_WALL,
            TileKind::Water => CollisionCategory::TILE_VOID,
            _ => CollisionCategory::TILE,
        }
    }

    /// Walls stop players and bullets; water only stops players.
    pub fn mask(self) -> CollisionCategory {
        match self {
            TileKind::Building => CollisionCategory::PLAYER | CollisionCategory::BULLET,
            TileKind::Water => CollisionCategory::PLAYER,
            _ => CollisionCategory::empty(),
        }
    }

    pub fn half_extents(self) -> Vec2 {
        match self {
            TileKind::Building => Vec2::splat(TILE_RADIUS - 8.0),
            _ => Vec2::splat(TILE_RADIUS),
        }
    }

    pub fn is_solid(self) -> bool {
        !self.mask().is_empty()
    }

    /// Whether a powerup may be placed on this tile.
    pub fn is_open(self) -> bool {
        !self
            .category()
            .intersects(CollisionCategory::TILE_WALL | CollisionCategory::TILE_VOID)
    }
}
