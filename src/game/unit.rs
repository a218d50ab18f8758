use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{FactionId, Position};

/// Highest attainable level; reaching it with enough experience crowns a unit
pub const MAX_LEVEL: u32 = 8;

/// Unit categories used for capture eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Leader, hires at castles and may take them
    Royal,
    /// Melee infantry and cavalry, can take towns
    Fighter,
    /// Ranged support, cannot capture
    Marksman,
    /// Spell casters, can take towns
    Wizard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitType {
    King,
    Fighter,
    Archer,
    Knight,
    Mage,
}

impl UnitType {
    pub fn name(&self) -> &'static str {
        match self {
            UnitType::King => "King",
            UnitType::Fighter => "Fighter",
            UnitType::Archer => "Archer",
            UnitType::Knight => "Knight",
            UnitType::Mage => "Mage",
        }
    }

    pub fn class(&self) -> UnitClass {
        match self {
            UnitType::King => UnitClass::Royal,
            UnitType::Fighter | UnitType::Knight => UnitClass::Fighter,
            UnitType::Archer => UnitClass::Marksman,
            UnitType::Mage => UnitClass::Wizard,
        }
    }

    pub fn is_king(&self) -> bool {
        *self == UnitType::King
    }
}

/// Stable unit identifier, never reused within a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Static template for a unit type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCatalogEntry {
    pub name: String,
    pub hire_cost: u32,
    pub is_caster: bool,
    pub move_points: u32,
    pub max_food: u32,
    pub power: i32,
    pub defense: i32,
    pub level: u32,
    pub max_hp: i32,
    /// Counterattack reach; melee units 1, ranged units 3
    pub attack_range: u32,
    #[serde(default)]
    pub promotes_to: Option<UnitType>,
    #[serde(default)]
    pub promote_at_crown: bool,
}

/// Read-only catalog of every unit type plus the hire menu order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCatalog {
    pub units: HashMap<UnitType, UnitCatalogEntry>,
    pub hireable: Vec<UnitType>,
}

impl UnitCatalog {
    pub fn get(&self, unit_type: UnitType) -> Option<&UnitCatalogEntry> {
        self.units.get(&unit_type)
    }

    pub fn hire_cost(&self, unit_type: UnitType) -> Option<u32> {
        self.get(unit_type).map(|e| e.hire_cost)
    }

    pub fn is_caster(&self, unit_type: UnitType) -> bool {
        self.get(unit_type).is_some_and(|e| e.is_caster)
    }

    /// Cheapest hireable type the budget covers. Ties keep menu order.
    pub fn cheapest_affordable(&self, budget: u32) -> Option<(UnitType, u32)> {
        let mut best: Option<(UnitType, u32)> = None;
        for &unit_type in &self.hireable {
            let Some(cost) = self.hire_cost(unit_type) else {
                continue;
            };
            if cost > budget {
                continue;
            }
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((unit_type, cost));
            }
        }
        best
    }
}

/// Experience gain result, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExperienceOutcome {
    pub gained: u32,
    pub levels_gained: u32,
    pub crowned: bool,
    pub promoted_to: Option<UnitType>,
}

/// A live unit on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: UnitType,
    pub faction: FactionId,
    pub x: i32,
    pub y: i32,
    pub move_points: u32,
    pub food: u32,
    pub max_food: u32,
    pub moved_this_turn: bool,
    pub acted: bool,
    pub power: i32,
    pub defense: i32,
    pub level: u32,
    pub exp: u32,
    pub crown: bool,
    pub promoted: bool,
    pub hp: i32,
    pub max_hp: i32,
    pub attack_range: u32,
}

impl Unit {
    /// Fresh unit at full hp and food
    pub fn from_catalog(
        id: UnitId,
        unit_type: UnitType,
        entry: &UnitCatalogEntry,
        faction: FactionId,
        x: i32,
        y: i32,
    ) -> Self {
        Self {
            id,
            unit_type,
            faction,
            x,
            y,
            move_points: entry.move_points,
            food: entry.max_food,
            max_food: entry.max_food,
            moved_this_turn: false,
            acted: false,
            power: entry.power,
            defense: entry.defense,
            level: entry.level.clamp(1, MAX_LEVEL),
            exp: 0,
            crown: false,
            promoted: false,
            hp: entry.max_hp,
            max_hp: entry.max_hp,
            attack_range: entry.attack_range,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn is_damaged(&self) -> bool {
        self.hp < self.max_hp
    }

    pub fn is_hungry(&self) -> bool {
        self.food < self.max_food
    }

    pub fn reset_turn(&mut self) {
        self.moved_this_turn = false;
        self.acted = false;
    }

    /// Whether `target` lies within this unit's strike reach. Distance zero
    /// never counts.
    pub fn reaches(&self, target: Position) -> bool {
        let distance = self.position().chebyshev(target);
        distance >= 1 && distance <= self.attack_range
    }

    /// Add experience, level up through `thresholds` (one entry per level,
    /// `thresholds[level - 1]` is needed to leave that level), crown at the
    /// top level and run a crown promotion at most once.
    pub fn gain_experience(
        &mut self,
        amount: u32,
        thresholds: &[u32],
        catalog: &UnitCatalog,
    ) -> ExperienceOutcome {
        let mut outcome = ExperienceOutcome { gained: amount, ..Default::default() };
        self.exp = self.exp.saturating_add(amount);

        while self.level < MAX_LEVEL {
            match thresholds.get(self.level as usize - 1) {
                Some(&needed) if self.exp >= needed => {
                    self.level += 1;
                    outcome.levels_gained += 1;
                }
                _ => break,
            }
        }

        if self.level == MAX_LEVEL && !self.crown {
            if let Some(&needed) = thresholds.get(MAX_LEVEL as usize - 1) {
                if self.exp >= needed {
                    self.crown = true;
                    outcome.crowned = true;
                }
            }
        }

        if self.crown && !self.promoted {
            let target = catalog
                .get(self.unit_type)
                .filter(|e| e.promote_at_crown)
                .and_then(|e| e.promotes_to);
            if let Some(promoted_type) = target {
                if let Some(entry) = catalog.get(promoted_type) {
                    self.promote(promoted_type, entry);
                    outcome.promoted_to = Some(promoted_type);
                }
            }
        }

        outcome
    }

    /// Swap the stat template, keeping level, experience and crown
    fn promote(&mut self, unit_type: UnitType, entry: &UnitCatalogEntry) {
        self.unit_type = unit_type;
        self.move_points = entry.move_points;
        self.max_food = entry.max_food;
        self.power = entry.power;
        self.defense = entry.defense;
        self.max_hp = entry.max_hp;
        self.attack_range = entry.attack_range;
        self.hp = self.hp.min(self.max_hp);
        self.food = self.food.min(self.max_food);
        self.promoted = true;
    }
}
