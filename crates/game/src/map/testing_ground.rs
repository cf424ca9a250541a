use super::objects::TileKind;
use super::ArenaMap;

/// Rows top to bottom.
const TESTING_GROUND: [&str; 12] = [
    "   xxxxx    ###~",
    "------+-----###~",
    "##### |  xx ###~",
    "~~~  x|  xx~~ ~~",
    "~~~ ##+----+----",
    " ##  x|~##~|##  ",
    " ##  x|~##~+--+#",
    "  +---+----+#x|#",
    "  |#xx|x## +--+#",
    "# |###| ##x|x###",
    "--+---+----+----",
    " #### ~~~ ##xx  ",
];

impl ArenaMap {
    /// The bundled 16x12 test map.
    pub fn testing_ground() -> Self {
        let mut tiles = Vec::with_capacity(16 * 12);

        // Row 0 is the bottom of the map.
        for row in TESTING_GROUND.iter().rev() {
            tiles.extend(row.chars().map(|symbol| {
                TileKind::from_symbol(symbol).unwrap_or(TileKind::Grass)
            }));
        }

        Self::new(16, 12, tiles)
    }
}
