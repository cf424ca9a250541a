mod objects;
mod testing_ground;

use glam::Vec2;

use crate::physics::{BoxBody, Physics};

pub use objects::{TileKind, TILE_RADIUS};

/// A grid of square tiles, row-major from the bottom-left corner.
#[derive(Debug, Clone)]
pub struct ArenaMap {
    width: usize,
    height: usize,
    tiles: Vec<TileKind>,
}

impl ArenaMap {
    /// Panics if `tiles` does not hold `width * height` entries.
    pub fn new(width: usize, height: usize, tiles: Vec<TileKind>) -> Self {
        assert_eq!(
            tiles.len(),
            width * height,
            "map tile count does not match its extents"
        );
        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32) * TILE_RADIUS * 2.0
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<TileKind> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.tiles.get(y * self.width + x).copied()
    }

    pub fn tile_center(&self, x: usize, y: usize) -> Vec2 {
        Vec2::splat(TILE_RADIUS) + Vec2::new(x as f32, y as f32) * TILE_RADIUS * 2.0
    }

    fn coords(&self) -> impl Iterator<Item = (usize, usize, TileKind)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, &kind)| (i % self.width, i / self.width, kind))
    }

    /// Centres of tiles a powerup may spawn on.
    pub fn open_tiles(&self) -> Vec<Vec2> {
        self.coords()
            .filter(|(_, _, kind)| kind.is_open())
            .map(|(x, y, _)| self.tile_center(x, y))
            .collect()
    }

    /// Adds a blocker for every solid tile and the outer bounds.
    pub fn build_colliders(&self, physics: &mut dyn Physics) {
        for (x, y, kind) in self.coords().filter(|(_, _, kind)| kind.is_solid()) {
            physics.add_box(BoxBody {
                center: self.tile_center(x, y),
                half_extents: kind.half_extents(),
                category: kind.category(),
                mask: kind.mask(),
            });
        }
        physics.set_world_bounds(self.size());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsWorld;

    #[test]
    fn test_open_tiles_exclude_walls_and_water() {
        let map = ArenaMap::new(
            3,
            1,
            vec![TileKind::Grass, TileKind::Building, TileKind::Water],
        );
        assert_eq!(map.open_tiles(), vec![Vec2::splat(TILE_RADIUS)]);
    }

    #[test]
    fn test_colliders_include_bounds() {
        let map = ArenaMap::new(2, 1, vec![TileKind::Building, TileKind::Rubble]);
        let mut physics = PhysicsWorld::new();
        map.build_colliders(&mut physics);
        assert_eq!(physics.body_count(), 1 + 4);
    }

    #[test]
    #[should_panic(expected = "map tile count")]
    fn test_bad_extents_panic() {
        ArenaMap::new(2, 2, vec![TileKind::Grass]);
    }
}
