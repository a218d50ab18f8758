use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use super::{Faction, FactionId, GameData, GameMap, TileType, Unit, UnitId, UnitType};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to parse scenario RON: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("failed to parse scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("layout has {rows} rows but height is {height}")]
    RowCount { rows: usize, height: u32 },

    #[error("layout row {row} has {len} cells but width is {width}")]
    RowWidth { row: usize, len: usize, width: u32 },

    #[error("unknown tile symbol {symbol:?} at ({x}, {y})")]
    UnknownSymbol { symbol: char, x: i32, y: i32 },

    #[error("({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds { x: i32, y: i32, width: u32, height: u32 },

    #[error("({x}, {y}) is {tile_type:?} and cannot be owned")]
    NotCapturable { x: i32, y: i32, tile_type: TileType },

    #[error("more than one unit placed at ({x}, {y})")]
    StackedUnits { x: i32, y: i32 },

    #[error("{0:?} is not one of the scenario's factions")]
    UnknownFaction(FactionId),

    #[error("no catalog entry for {0:?}")]
    UnknownUnitType(UnitType),

    #[error("scenario lists no factions")]
    NoFactions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    pub unit_type: UnitType,
    pub faction: FactionId,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOwnership {
    pub x: i32,
    pub y: i32,
    pub owner: FactionId,
}

/// Static battle setup: terrain, owners, the starting roster and the faction
/// turn order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    /// Turn order
    pub factions: Vec<Faction>,
    pub width: u32,
    pub height: u32,
    /// One string per row, one legend symbol per cell (G R F M T C)
    pub layout: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyOwnership>,
    pub units: Vec<UnitPlacement>,
    #[serde(default)]
    pub starting_budget: u32,
}

impl Scenario {
    pub fn from_ron(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_json(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Read a `.ron` or `.json` scenario file
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Self::from_ron(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn to_json(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn faction_order(&self) -> Vec<FactionId> {
        self.factions.iter().map(|f| f.id).collect()
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.factions.is_empty() {
            return Err(ScenarioError::NoFactions);
        }
        let map = self.build_map()?;

        for property in &self.properties {
            self.check_bounds(property.x, property.y)?;
            self.check_faction(property.owner)?;
            let tile_type = map.tile_type(property.x, property.y).unwrap_or(TileType::Grass);
            if !tile_type.is_capturable() {
                return Err(ScenarioError::NotCapturable {
                    x: property.x,
                    y: property.y,
                    tile_type,
                });
            }
        }

        let mut occupied = BTreeSet::new();
        for placement in &self.units {
            self.check_bounds(placement.x, placement.y)?;
            self.check_faction(placement.faction)?;
            if !occupied.insert((placement.x, placement.y)) {
                return Err(ScenarioError::StackedUnits {
                    x: placement.x,
                    y: placement.y,
                });
            }
        }
        Ok(())
    }

    fn check_bounds(&self, x: i32, y: i32) -> Result<(), ScenarioError> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return Err(ScenarioError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    fn check_faction(&self, faction: FactionId) -> Result<(), ScenarioError> {
        if self.factions.iter().any(|f| f.id == faction) {
            Ok(())
        } else {
            Err(ScenarioError::UnknownFaction(faction))
        }
    }

    /// Terrain and initial owners
    pub fn build_map(&self) -> Result<GameMap, ScenarioError> {
        if self.layout.len() != self.height as usize {
            return Err(ScenarioError::RowCount {
                rows: self.layout.len(),
                height: self.height,
            });
        }
        let mut map = GameMap::new(self.width, self.height);
        for (y, row) in self.layout.iter().enumerate() {
            let len = row.chars().count();
            if len != self.width as usize {
                return Err(ScenarioError::RowWidth {
                    row: y,
                    len,
                    width: self.width,
                });
            }
            for (x, symbol) in row.chars().enumerate() {
                let (x, y) = (x as i32, y as i32);
                let tile_type = TileType::from_symbol(symbol)
                    .ok_or(ScenarioError::UnknownSymbol { symbol, x, y })?;
                map.set_type(x, y, tile_type);
            }
        }
        for property in &self.properties {
            if let Some(tile) = map.get_mut(property.x, property.y) {
                tile.set_owner(Some(property.owner));
            }
        }
        Ok(map)
    }

    /// Starting roster with ids 1.. in placement order
    pub fn build_units(&self, data: &GameData) -> Result<Vec<Unit>, ScenarioError> {
        self.units
            .iter()
            .zip(1..)
            .map(|(placement, id)| {
                let entry = data
                    .catalog
                    .get(placement.unit_type)
                    .ok_or(ScenarioError::UnknownUnitType(placement.unit_type))?;
                Ok(Unit::from_catalog(
                    UnitId(id),
                    placement.unit_type,
                    entry,
                    placement.faction,
                    placement.x,
                    placement.y,
                ))
            })
            .collect()
    }
}

/// The built-in four-faction skirmish on a 12x10 field
pub fn sample_scenario() -> Scenario {
    let layout = [
        "GGGGGGGGGGGG",
        "GGFFGGGGRRGG",
        "GGFTGGGGRRGG",
        "GGFFGGGGGGGG",
        "GGGGGGMMMGGG",
        "GGGGGGRRRGGG",
        "GGGGGGGGGGGG",
        "GGRRGGGGGCGG",
        "GGRRGGGGGGGG",
        "GGGGGGGGGGGG",
    ];

    let placement = |unit_type, faction, x, y| UnitPlacement { unit_type, faction, x, y };

    Scenario {
        id: "sample".to_string(),
        name: "Sample Campaign".to_string(),
        factions: vec![
            Faction::new(FactionId::Blue, "Blue Army", [0.302, 0.671, 0.969]),
            Faction::new(FactionId::Red, "Red Army", [1.0, 0.420, 0.420]),
            Faction::new(FactionId::Yellow, "Yellow Army", [0.949, 0.788, 0.298]),
            Faction::new(FactionId::Green, "Green Army", [0.318, 0.812, 0.4]),
        ],
        width: 12,
        height: 10,
        layout: layout.iter().map(|row| row.to_string()).collect(),
        properties: vec![
            PropertyOwnership { x: 3, y: 2, owner: FactionId::Red },
            PropertyOwnership { x: 9, y: 7, owner: FactionId::Blue },
        ],
        units: vec![
            placement(UnitType::King, FactionId::Blue, 1, 1),
            placement(UnitType::Fighter, FactionId::Blue, 2, 3),
            placement(UnitType::King, FactionId::Red, 9, 8),
            placement(UnitType::Fighter, FactionId::Red, 8, 6),
            placement(UnitType::Fighter, FactionId::Yellow, 5, 1),
            placement(UnitType::King, FactionId::Green, 6, 8),
        ],
        starting_budget: 100,
    }
}
