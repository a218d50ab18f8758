use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{FactionId, GameMap, Position, RulesConfig, TileType, Unit, UnitClass, NEIGHBORHOOD};

/// Spendable currency for each faction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionBudgets {
    budgets: BTreeMap<FactionId, u32>,
}

impl FactionBudgets {
    pub fn new(factions: impl IntoIterator<Item = FactionId>, starting: u32) -> Self {
        Self {
            budgets: factions.into_iter().map(|f| (f, starting)).collect(),
        }
    }

    pub fn get(&self, faction: FactionId) -> u32 {
        *self.budgets.get(&faction).unwrap_or(&0)
    }

    pub fn set(&mut self, faction: FactionId, amount: u32) {
        self.budgets.insert(faction, amount);
    }

    pub fn add(&mut self, faction: FactionId, amount: u32) {
        let current = self.budgets.entry(faction).or_insert(0);
        *current = current.saturating_add(amount);
    }

    /// Deduct `amount` only if the whole sum is available
    pub fn spend(&mut self, faction: FactionId, amount: u32) -> bool {
        let current = self.budgets.entry(faction).or_insert(0);
        if *current >= amount {
            *current -= amount;
            true
        } else {
            false
        }
    }
}

/// Breakdown of the income credited at the start of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeReport {
    pub faction: FactionId,
    pub towns: u32,
    pub castles: u32,
    pub income_per_town: u32,
    pub income_per_castle: u32,
    pub base: u32,
    pub before: u32,
    pub after: u32,
}

impl IncomeReport {
    pub fn total(&self) -> u32 {
        self.after - self.before
    }
}

/// `base + towns * per_town + castles * per_castle` for the structures the
/// faction owns right now
pub fn income_for(map: &GameMap, faction: FactionId, rules: &RulesConfig) -> (u32, u32, u32) {
    let (towns, castles) = map.count_owned(faction);
    let income = rules.base_income + towns * rules.income_per_town + castles * rules.income_per_castle;
    (towns, castles, income)
}

/// Credit turn-start income and describe it
pub fn collect_income(
    map: &GameMap,
    budgets: &mut FactionBudgets,
    faction: FactionId,
    rules: &RulesConfig,
) -> IncomeReport {
    let (towns, castles, income) = income_for(map, faction, rules);
    let before = budgets.get(faction);
    budgets.add(faction, income);
    IncomeReport {
        faction,
        towns,
        castles,
        income_per_town: rules.income_per_town,
        income_per_castle: rules.income_per_castle,
        base: rules.base_income,
        before,
        after: budgets.get(faction),
    }
}

/// What a supply purchase would do. `spent == 0` means nothing to buy.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyOutcome {
    pub unit: Unit,
    pub hp_restored: i32,
    pub food_restored: u32,
    pub spent: u32,
}

/// Points of a stat the budget buys: capped by what is missing and by
/// affordability
fn affordable_points(missing: u32, price: u32, budget: u32) -> u32 {
    if price == 0 {
        missing
    } else {
        missing.min(budget / price)
    }
}

/// Restore hp first, then food from what is left of the budget
pub fn plan_supply(unit: &Unit, budget: u32, rules: &RulesConfig) -> SupplyOutcome {
    let mut after = unit.clone();
    let mut remaining = budget;

    let missing_hp = (unit.max_hp - unit.hp).max(0) as u32;
    let hp_points = affordable_points(missing_hp, rules.cost_hp_per_point, remaining);
    remaining -= hp_points * rules.cost_hp_per_point;
    after.hp += hp_points as i32;

    let missing_food = unit.max_food.saturating_sub(unit.food);
    let food_points = affordable_points(missing_food, rules.cost_food_per_point, remaining);
    remaining -= food_points * rules.cost_food_per_point;
    after.food += food_points;

    SupplyOutcome {
        unit: after,
        hp_restored: hp_points as i32,
        food_restored: food_points,
        spent: budget - remaining,
    }
}

/// Whether `unit` may supply on the cell it stands on
pub fn can_supply_at(map: &GameMap, unit: &Unit) -> bool {
    map.get(unit.x, unit.y)
        .is_some_and(|t| t.tile_type.is_capturable() && t.is_owned_by(unit.faction))
}

/// Castles fall to Kings only; towns to Kings, fighters and wizards
pub fn can_occupy_at(map: &GameMap, unit: &Unit) -> bool {
    let Some(tile) = map.get(unit.x, unit.y) else {
        return false;
    };
    if tile.is_owned_by(unit.faction) {
        return false;
    }
    match tile.tile_type {
        TileType::Castle => unit.unit_type.is_king(),
        TileType::Town => matches!(
            unit.unit_type.class(),
            UnitClass::Royal | UnitClass::Fighter | UnitClass::Wizard
        ),
        _ => false,
    }
}

/// A King standing on a castle may hire
pub fn can_hire_at(map: &GameMap, unit: &Unit) -> bool {
    unit.unit_type.is_king() && map.tile_type(unit.x, unit.y) == Some(TileType::Castle)
}

/// First free in-bounds neighbour of `origin`, scanned in `NEIGHBORHOOD` order
pub fn find_spawn_cell(map: &GameMap, units: &[Unit], origin: Position) -> Option<Position> {
    NEIGHBORHOOD
        .iter()
        .map(|&(dx, dy)| origin.offset(dx, dy))
        .find(|p| map.in_bounds(p.x, p.y) && !units.iter().any(|u| u.position() == *p))
}
