use serde::{Deserialize, Serialize};

use super::FactionId;

/// Terrain of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    /// Open field
    Grass,
    /// Road - fast movement, no cover
    Road,
    /// Woods - slower movement, light cover
    Forest,
    /// High ground - slow movement, heavy cover
    Mountain,
    /// Capturable settlement, produces income
    Town,
    /// Capturable fortress, produces income and lets a King hire
    Castle,
}

impl TileType {
    pub fn name(&self) -> &'static str {
        match self {
            TileType::Grass => "Grass",
            TileType::Road => "Road",
            TileType::Forest => "Forest",
            TileType::Mountain => "Mountain",
            TileType::Town => "Town",
            TileType::Castle => "Castle",
        }
    }

    /// Defense added to a unit standing on this terrain
    pub fn defense_bonus(&self) -> i32 {
        match self {
            TileType::Grass | TileType::Road => 0,
            TileType::Forest | TileType::Town => 1,
            TileType::Mountain | TileType::Castle => 2,
        }
    }

    /// Movement cost to enter this terrain
    pub fn movement_cost(&self) -> u32 {
        match self {
            TileType::Grass => 1,
            TileType::Road => 1,
            TileType::Forest => 2,
            TileType::Mountain => 3,
            TileType::Town => 1,
            TileType::Castle => 1,
        }
    }

    /// Whether this terrain can carry an owner
    pub fn is_capturable(&self) -> bool {
        matches!(self, TileType::Town | TileType::Castle)
    }

    /// Legend character used by scenario layouts
    pub fn from_symbol(symbol: char) -> Option<TileType> {
        match symbol {
            'G' => Some(TileType::Grass),
            'R' => Some(TileType::Road),
            'F' => Some(TileType::Forest),
            'M' => Some(TileType::Mountain),
            'T' => Some(TileType::Town),
            'C' => Some(TileType::Castle),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            TileType::Grass => 'G',
            TileType::Road => 'R',
            TileType::Forest => 'F',
            TileType::Mountain => 'M',
            TileType::Town => 'T',
            TileType::Castle => 'C',
        }
    }
}

/// A single cell on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TileRecord")]
pub struct Tile {
    pub tile_type: TileType,
    owner: Option<FactionId>,
}

#[derive(Deserialize)]
struct TileRecord {
    tile_type: TileType,
    #[serde(default)]
    owner: Option<FactionId>,
}

impl TryFrom<TileRecord> for Tile {
    type Error = String;

    fn try_from(record: TileRecord) -> Result<Self, Self::Error> {
        if record.owner.is_some() && !record.tile_type.is_capturable() {
            return Err(format!("{} cannot have an owner", record.tile_type.name()));
        }
        Ok(Self { tile_type: record.tile_type, owner: record.owner })
    }
}

impl Tile {
    pub fn new(tile_type: TileType) -> Self {
        Self { tile_type, owner: None }
    }

    pub fn owner(&self) -> Option<FactionId> {
        self.owner
    }

    /// Set the owner. Ignored for terrain that cannot be captured.
    pub fn set_owner(&mut self, owner: Option<FactionId>) {
        if self.tile_type.is_capturable() {
            self.owner = owner;
        }
    }

    pub fn is_owned_by(&self, faction: FactionId) -> bool {
        self.owner == Some(faction)
    }
}

/// Grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// King-move distance; 1 means one of the eight neighbours
    pub fn chebyshev(&self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn is_adjacent(&self, other: Position) -> bool {
        self.chebyshev(other) == 1
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

/// Orthogonal step order: up, down, left, right
pub const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Eight-neighbourhood scan order used when placing hired units
pub const NEIGHBORHOOD: [(i32, i32); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// The battle map. Row-major: `index = y * width + x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMap {
    pub width: u32,
    pub height: u32,
    tiles: Vec<Tile>,
}

impl GameMap {
    /// Create a map filled with grass
    pub fn new(width: u32, height: u32) -> Self {
        let tiles = vec![Tile::new(TileType::Grass); (width * height) as usize];
        Self { width, height, tiles }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn position_of(&self, index: usize) -> Position {
        let width = self.width as usize;
        Position::new((index % width) as i32, (index / width) as i32)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index_of(x, y).map(|i| &self.tiles[i])
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index_of(x, y).map(move |i| &mut self.tiles[i])
    }

    pub fn tile_type(&self, x: i32, y: i32) -> Option<TileType> {
        self.get(x, y).map(|t| t.tile_type)
    }

    pub fn set_type(&mut self, x: i32, y: i32, tile_type: TileType) {
        if let Some(tile) = self.get_mut(x, y) {
            *tile = Tile::new(tile_type);
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Number of towns and castles owned by a faction
    pub fn count_owned(&self, faction: FactionId) -> (u32, u32) {
        self.tiles
            .iter()
            .filter(|t| t.is_owned_by(faction))
            .fold((0, 0), |(towns, castles), t| match t.tile_type {
                TileType::Town => (towns + 1, castles),
                TileType::Castle => (towns, castles + 1),
                _ => (towns, castles),
            })
    }

    /// Every capturable cell with its current owner
    pub fn structures(&self) -> impl Iterator<Item = (Position, &Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.tile_type.is_capturable())
            .map(|(i, t)| (self.position_of(i), t))
    }
}
