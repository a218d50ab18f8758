use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    can_hire_at, can_occupy_at, can_supply_at, collect_income, find_spawn_cell, plan_supply,
    resolve, unit_movement_range, unit_path, BattleOutcome, ControllerType, EffectQueue, Faction,
    FactionBudgets, FactionId, GameConfig, GameData, GameMap, IncomeReport, Position,
    ReachableResult, Scenario, ScenarioError, TileType, TurnState, UiEffect, Unit, UnitId,
    UnitType,
};

/// Entries of a unit's action menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitAction {
    Move,
    Attack,
    Magic,
    Occupy,
    Supply,
    Hire,
    Wait,
}

impl UnitAction {
    pub fn name(&self) -> &'static str {
        match self {
            UnitAction::Move => "Move",
            UnitAction::Attack => "Attack",
            UnitAction::Magic => "Magic",
            UnitAction::Occupy => "Occupy",
            UnitAction::Supply => "Supply",
            UnitAction::Hire => "Hire",
            UnitAction::Wait => "Wait",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextAction {
    EndTurn,
}

/// A list of options with one highlighted entry
#[derive(Debug, Clone, PartialEq)]
pub struct Menu<T> {
    pub options: Vec<T>,
    pub index: usize,
}

impl<T: Copy> Menu<T> {
    pub fn new(options: Vec<T>) -> Self {
        Self { options, index: 0 }
    }

    pub fn highlighted(&self) -> Option<T> {
        self.options.get(self.index).copied()
    }

    pub fn next(&mut self) {
        if !self.options.is_empty() {
            self.index = (self.index + 1) % self.options.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.options.is_empty() {
            self.index = (self.index + self.options.len() - 1) % self.options.len();
        }
    }

    pub fn highlight(&mut self, index: usize) -> bool {
        if index < self.options.len() {
            self.index = index;
            true
        } else {
            false
        }
    }
}

/// Transient input modality. Reset as a whole whenever a turn ends or a
/// menu closes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiIntent {
    pub selected_unit: Option<UnitId>,
    pub movement_range: Option<ReachableResult>,
    pub attack_mode: bool,
    pub magic_mode: bool,
    pub selected_spell: Option<usize>,
    pub action_menu: Option<Menu<UnitAction>>,
    pub hire_menu: Option<Menu<UnitType>>,
    pub context_menu: Option<(Position, Menu<ContextAction>)>,
}

impl UiIntent {
    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }
}

/// The whole battle. Every intent checks legality and returns `false`
/// without touching anything when the intent is illegal.
#[derive(Resource, Debug, Clone)]
pub struct BattleState {
    pub map: GameMap,
    pub units: Vec<Unit>,
    /// Turn order
    pub factions: Vec<Faction>,
    pub config: GameConfig,
    pub data: GameData,
    pub turn: TurnState,
    pub budgets: FactionBudgets,
    pub ui: UiIntent,
    pub cursor: Position,
    next_unit_id: u32,
    income_report: Option<IncomeReport>,
    effects: EffectQueue,
    movement_paths: BTreeMap<UnitId, Vec<Position>>,
    cpu_hires_remaining: u32,
    winner: Option<FactionId>,
}

impl BattleState {
    pub fn new(scenario: &Scenario, data: GameData, config: GameConfig) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let map = scenario.build_map()?;
        let units = scenario.build_units(&data)?;
        let order = scenario.faction_order();
        let turn = TurnState::first(&order, |f| units.iter().any(|u| u.faction == f))
            .ok_or(ScenarioError::NoFactions)?;
        let next_unit_id = units.iter().map(|u| u.id.0).max().unwrap_or(0) + 1;

        let mut state = Self {
            map,
            budgets: FactionBudgets::new(order, scenario.starting_budget),
            units,
            factions: scenario.factions.clone(),
            config,
            data,
            turn,
            ui: UiIntent::default(),
            cursor: Position::new(0, 0),
            next_unit_id,
            income_report: None,
            effects: EffectQueue::default(),
            movement_paths: BTreeMap::new(),
            cpu_hires_remaining: 0,
            winner: None,
        };
        info!("Battle '{}' begins", scenario.name);
        state.begin_turn();
        state.check_victory();
        Ok(state)
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn current_faction(&self) -> FactionId {
        self.turn.current_faction
    }

    pub fn current_controller(&self) -> ControllerType {
        self.config.controller(self.turn.current_faction)
    }

    pub fn faction_order(&self) -> Vec<FactionId> {
        self.factions.iter().map(|f| f.id).collect()
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.iter().find(|f| f.id == id)
    }

    pub fn faction_name(&self, id: FactionId) -> &str {
        self.faction(id).map(|f| f.name.as_str()).unwrap_or("Unknown")
    }

    pub fn budget(&self, faction: FactionId) -> u32 {
        self.budgets.get(faction)
    }

    pub fn winner(&self) -> Option<FactionId> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn income_report(&self) -> Option<&IncomeReport> {
        self.income_report.as_ref()
    }

    pub fn effects(&self) -> &EffectQueue {
        &self.effects
    }

    pub fn cpu_hires_remaining(&self) -> u32 {
        self.cpu_hires_remaining
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_at(&self, pos: Position) -> Option<&Unit> {
        self.units.iter().find(|u| u.position() == pos)
    }

    pub fn has_units(&self, faction: FactionId) -> bool {
        self.units.iter().any(|u| u.faction == faction)
    }

    /// First enemy of `unit` in roster order standing next to it
    pub fn adjacent_enemy(&self, unit: &Unit) -> Option<&Unit> {
        self.enemy_adjacent_to(unit.position(), unit.faction)
    }

    pub fn enemy_adjacent_to(&self, pos: Position, faction: FactionId) -> Option<&Unit> {
        self.units
            .iter()
            .find(|other| other.faction != faction && other.position().is_adjacent(pos))
    }

    /// A King on a castle, unless hiring costs its action and it already acted
    fn may_hire(&self, king: &Unit) -> bool {
        can_hire_at(&self.map, king) && !(self.data.rules.hire_consumes_action && king.acted)
    }

    /// Whether a King on a castle could hire anything right now
    pub fn can_hire(&self, unit: &Unit) -> bool {
        self.may_hire(unit)
            && find_spawn_cell(&self.map, &self.units, unit.position()).is_some()
            && self
                .data
                .catalog
                .cheapest_affordable(self.budgets.get(unit.faction))
                .is_some()
    }

    pub fn can_hire_unit_type(&self, king_id: UnitId, unit_type: UnitType) -> bool {
        let Some(king) = self.unit(king_id) else {
            return false;
        };
        let Some(cost) = self.data.catalog.hire_cost(unit_type) else {
            return false;
        };
        self.may_hire(king)
            && self.data.catalog.hireable.contains(&unit_type)
            && find_spawn_cell(&self.map, &self.units, king.position()).is_some()
            && self.budgets.get(king.faction) >= cost
    }

    /// Units `spell_index` could land on when cast by `caster_id`
    pub fn spell_targets(&self, caster_id: UnitId, spell_index: usize) -> Vec<UnitId> {
        let (Some(caster), Some(spell)) = (self.unit(caster_id), self.data.spells.get(spell_index)) else {
            return Vec::new();
        };
        self.units
            .iter()
            .filter(|target| spell.can_target(caster, target))
            .map(|target| target.id)
            .collect()
    }

    /// Spells with at least one legal target for `caster_id`
    pub fn castable_spells(&self, caster_id: UnitId) -> Vec<usize> {
        (0..self.data.spells.spells.len())
            .filter(|&i| !self.spell_targets(caster_id, i).is_empty())
            .collect()
    }

    /// Where `id` could end a move this turn
    pub fn movement_range(&self, id: UnitId) -> Option<ReachableResult> {
        let unit = self.unit(id)?;
        Some(unit_movement_range(&self.map, &self.units, unit))
    }

    /// Options a unit's action menu would offer
    pub fn action_options(&self, id: UnitId) -> Vec<UnitAction> {
        let Some(unit) = self.unit(id) else {
            return Vec::new();
        };
        let mut options = Vec::new();
        if !unit.acted {
            if !unit.moved_this_turn && unit.food > 0 {
                let range = unit_movement_range(&self.map, &self.units, unit);
                if range.positions().any(|p| p != unit.position()) {
                    options.push(UnitAction::Move);
                }
            }
            if self.adjacent_enemy(unit).is_some() {
                options.push(UnitAction::Attack);
            }
            if self.data.catalog.is_caster(unit.unit_type) && !self.castable_spells(id).is_empty() {
                options.push(UnitAction::Magic);
            }
            if can_occupy_at(&self.map, unit) {
                options.push(UnitAction::Occupy);
            }
            if can_supply_at(&self.map, unit)
                && plan_supply(unit, self.budgets.get(unit.faction), &self.data.rules).spent > 0
            {
                options.push(UnitAction::Supply);
            }
        }
        if self.can_hire(unit) {
            options.push(UnitAction::Hire);
        }
        if !unit.acted {
            options.push(UnitAction::Wait);
        }
        options
    }

    // ------------------------------------------------------------------
    // Turn flow
    // ------------------------------------------------------------------

    fn begin_turn(&mut self) {
        let faction = self.turn.current_faction;
        for unit in self.units.iter_mut().filter(|u| u.faction == faction) {
            unit.reset_turn();
        }
        self.clear_selection();
        self.cpu_hires_remaining = self.data.rules.cpu_hires_per_turn;

        let report = collect_income(&self.map, &mut self.budgets, faction, &self.data.rules);
        info!(
            "{} receives {} income (total: {})",
            self.faction_name(faction),
            report.total(),
            report.after
        );
        self.income_report = Some(report);

        let (label, color) = match self.faction(faction) {
            Some(f) => (f.name.clone(), f.color),
            None => (format!("{:?}", faction), [1.0, 1.0, 1.0]),
        };
        self.effects.push(UiEffect::TurnChanged { faction, label, color });
        info!("Round {}: {}'s turn", self.turn.round_count, self.faction_name(faction));
    }

    /// Hand the turn to the next faction with units left
    pub fn end_turn(&mut self) -> bool {
        if self.is_over() {
            return false;
        }
        self.clear_selection();
        let order = self.faction_order();
        let units = &self.units;
        if !self.turn.advance(&order, |f| units.iter().any(|u| u.faction == f)) {
            warn!("No faction has units left to take a turn");
            return false;
        }
        self.begin_turn();
        true
    }

    pub fn confirm_income_report(&mut self) -> bool {
        self.income_report.take().is_some()
    }

    fn check_victory(&mut self) {
        if self.winner.is_some() {
            return;
        }
        let alive: Vec<FactionId> = self
            .faction_order()
            .into_iter()
            .filter(|&f| self.has_units(f))
            .collect();
        if let [survivor] = alive.as_slice() {
            self.winner = Some(*survivor);
            self.clear_selection();
            info!("{} wins by elimination!", self.faction_name(*survivor));
        }
    }

    // ------------------------------------------------------------------
    // Effects and paths for the presentation layer
    // ------------------------------------------------------------------

    pub fn pop_effect(&mut self) -> Option<UiEffect> {
        self.effects.pop()
    }

    pub fn drain_effects(&mut self) -> Vec<UiEffect> {
        self.effects.drain()
    }

    /// Paths of every move committed since the last call, keyed by unit
    pub fn take_movement_paths(&mut self) -> BTreeMap<UnitId, Vec<Position>> {
        std::mem::take(&mut self.movement_paths)
    }

    // ------------------------------------------------------------------
    // Unit intents
    // ------------------------------------------------------------------

    /// Roster index of `id` if it belongs to the faction whose turn it is
    fn commandable(&self, id: UnitId) -> Option<usize> {
        if self.is_over() {
            return None;
        }
        self.units
            .iter()
            .position(|u| u.id == id && u.faction == self.turn.current_faction)
    }

    fn unit_index(&self, id: UnitId) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    /// Select a unit and open its action menu
    pub fn select_unit(&mut self, id: UnitId) -> bool {
        let Some(index) = self.commandable(id) else {
            return false;
        };
        let unit = &self.units[index];
        if unit.acted && !self.can_hire(unit) {
            return false;
        }
        let range = (!unit.acted && !unit.moved_this_turn)
            .then(|| unit_movement_range(&self.map, &self.units, unit));
        let options = self.action_options(id);

        self.clear_selection();
        self.ui.selected_unit = Some(id);
        self.ui.movement_range = range;
        self.ui.action_menu = Some(Menu::new(options));
        true
    }

    /// Walk to `target`. Food drops by the number of steps taken.
    pub fn move_unit_to(&mut self, id: UnitId, target: Position) -> bool {
        let Some(index) = self.commandable(id) else {
            return false;
        };
        let unit = &self.units[index];
        if unit.acted || unit.moved_this_turn || unit.position() == target {
            return false;
        }
        let range = unit_movement_range(&self.map, &self.units, unit);
        if !range.contains(target) {
            return false;
        }
        let path = unit_path(&self.map, &range, target);
        debug_assert!(path.is_some(), "reachable cell {:?} has no path", target);
        let Some(path) = path else {
            return false;
        };
        let steps = path.len() as u32 - 1;
        if steps > unit.food {
            return false;
        }

        let unit = &mut self.units[index];
        unit.x = target.x;
        unit.y = target.y;
        unit.food -= steps;
        unit.moved_this_turn = true;
        debug!(
            "{} moved to ({}, {}) in {} steps",
            unit.unit_type.name(),
            target.x,
            target.y,
            steps
        );
        self.movement_paths.insert(id, path);

        self.ui.movement_range = None;
        self.ui.attack_mode = false;
        self.ui.magic_mode = false;
        if self.ui.selected_unit == Some(id) {
            self.ui.action_menu = Some(Menu::new(self.action_options(id)));
        }
        true
    }

    /// Strike an adjacent enemy. The exchange is resolved on copies and
    /// committed back by id.
    pub fn attack_unit(&mut self, attacker_id: UnitId, defender_id: UnitId) -> bool {
        let Some(attacker_index) = self.commandable(attacker_id) else {
            return false;
        };
        let Some(defender_index) = self.unit_index(defender_id) else {
            return false;
        };
        let attacker = &self.units[attacker_index];
        let defender = &self.units[defender_index];
        if attacker.acted
            || attacker.faction == defender.faction
            || !attacker.position().is_adjacent(defender.position())
        {
            return false;
        }

        let outcome = resolve(attacker, defender, &self.map, &self.data.rules);
        for line in &outcome.log {
            info!("{}", line);
        }
        self.effects.push(UiEffect::UnitAttacked {
            attacker_id,
            defender_id,
            attacker_type: attacker.unit_type,
            defender_type: defender.unit_type,
            attacker_faction: attacker.faction,
            defender_faction: defender.faction,
            attacker_hp_before: attacker.hp,
            attacker_hp_after: outcome.attacker.hp.max(0),
            defender_hp_before: defender.hp,
            defender_hp_after: outcome.defender.hp.max(0),
        });

        let BattleOutcome {
            mut attacker,
            mut defender,
            attacker_defeated,
            defender_defeated,
            ..
        } = outcome;
        attacker.acted = true;
        if defender_defeated && !attacker_defeated {
            self.award_kill(&mut attacker, defender.unit_type);
        }
        if attacker_defeated && !defender_defeated {
            self.award_kill(&mut defender, attacker.unit_type);
        }
        self.commit_unit(attacker);
        self.commit_unit(defender);

        self.clear_selection();
        self.check_victory();
        true
    }

    /// Cast `spell_index` from the spell book on `target_id`
    pub fn cast_spell(&mut self, caster_id: UnitId, spell_index: usize, target_id: UnitId) -> bool {
        let Some(caster_index) = self.commandable(caster_id) else {
            return false;
        };
        let Some(target_index) = self.unit_index(target_id) else {
            return false;
        };
        let caster = &self.units[caster_index];
        let target = &self.units[target_index];
        let Some(spell) = self.data.spells.get(spell_index) else {
            return false;
        };
        if caster.acted
            || !self.data.catalog.is_caster(caster.unit_type)
            || !spell.can_target(caster, target)
        {
            return false;
        }

        let mut after = spell.apply(target);
        info!(
            "{} casts {} on {} (hp {} -> {})",
            caster.unit_type.name(),
            spell.name,
            target.unit_type.name(),
            target.hp,
            after.hp
        );
        self.effects.push(UiEffect::SpellCast {
            caster_id,
            target_id,
            spell: spell.id.clone(),
            target_hp_before: target.hp,
            target_hp_after: after.hp,
        });

        if caster_id == target_id {
            after.acted = true;
            self.commit_unit(after);
        } else {
            let mut caster = caster.clone();
            caster.acted = true;
            if after.hp <= 0 {
                self.award_kill(&mut caster, after.unit_type);
            }
            self.commit_unit(after);
            self.commit_unit(caster);
        }

        self.clear_selection();
        self.check_victory();
        true
    }

    /// Claim the town or castle the unit stands on
    pub fn occupy_unit(&mut self, id: UnitId) -> bool {
        let Some(index) = self.commandable(id) else {
            return false;
        };
        let unit = &self.units[index];
        if unit.acted || !can_occupy_at(&self.map, unit) {
            return false;
        }
        let (x, y, faction) = (unit.x, unit.y, unit.faction);
        let Some(tile) = self.map.get_mut(x, y) else {
            return false;
        };
        tile.set_owner(Some(faction));
        let tile_type = tile.tile_type;
        if tile_type == TileType::Town {
            self.effects.push(UiEffect::TileCaptured { x, y, faction, tile_type });
        }
        info!(
            "{} captured the {} at ({}, {})",
            self.faction_name(faction),
            tile_type.name(),
            x,
            y
        );

        self.units[index].acted = true;
        self.clear_selection();
        true
    }

    /// Buy back hp, then food, on an own town or castle
    pub fn supply_unit(&mut self, id: UnitId) -> bool {
        let Some(index) = self.commandable(id) else {
            return false;
        };
        let unit = &self.units[index];
        if unit.acted || !can_supply_at(&self.map, unit) {
            return false;
        }
        let faction = unit.faction;
        let outcome = plan_supply(unit, self.budgets.get(faction), &self.data.rules);
        if outcome.spent == 0 || !self.budgets.spend(faction, outcome.spent) {
            return false;
        }
        info!(
            "{} resupplied: +{} hp, +{} food for {}",
            outcome.unit.unit_type.name(),
            outcome.hp_restored,
            outcome.food_restored,
            outcome.spent
        );

        let mut supplied = outcome.unit;
        supplied.acted = true;
        self.units[index] = supplied;
        self.clear_selection();
        true
    }

    /// A King on a castle places a new unit on the first free neighbour
    pub fn hire_unit(&mut self, king_id: UnitId, unit_type: UnitType) -> bool {
        let Some(king_index) = self.commandable(king_id) else {
            return false;
        };
        let king = &self.units[king_index];
        if !self.may_hire(king) || !self.data.catalog.hireable.contains(&unit_type) {
            return false;
        }
        let Some(entry) = self.data.catalog.get(unit_type) else {
            return false;
        };
        let Some(spawn) = find_spawn_cell(&self.map, &self.units, king.position()) else {
            return false;
        };
        let faction = king.faction;
        if !self.budgets.spend(faction, entry.hire_cost) {
            debug!(
                "{:?} cannot afford {} ({} < {})",
                faction,
                entry.name,
                self.budgets.get(faction),
                entry.hire_cost
            );
            return false;
        }

        let mut unit = Unit::from_catalog(
            UnitId(self.next_unit_id),
            unit_type,
            entry,
            faction,
            spawn.x,
            spawn.y,
        );
        self.next_unit_id += 1;
        unit.acted = true;
        unit.moved_this_turn = true;
        info!(
            "{} hired a {} for {} (budget left: {})",
            self.faction_name(faction),
            entry.name,
            entry.hire_cost,
            self.budgets.get(faction)
        );
        self.units.push(unit);
        self.effects.push(UiEffect::UnitHired {
            x: spawn.x,
            y: spawn.y,
            unit_type,
            faction,
        });

        if self.data.rules.hire_consumes_action {
            self.units[king_index].acted = true;
        }
        self.clear_selection();
        true
    }

    /// End the unit's turn without doing anything
    pub fn wait_unit(&mut self, id: UnitId) -> bool {
        let Some(index) = self.commandable(id) else {
            return false;
        };
        if self.units[index].acted {
            return false;
        }
        self.units[index].acted = true;
        self.clear_selection();
        true
    }

    pub(crate) fn consume_cpu_hire(&mut self) {
        self.cpu_hires_remaining = self.cpu_hires_remaining.saturating_sub(1);
    }

    /// Mark a unit as done for the turn regardless of what else it could do
    pub(crate) fn finish_unit(&mut self, id: UnitId) {
        if let Some(index) = self.commandable(id) {
            self.units[index].acted = true;
        }
    }

    fn award_kill(&self, winner: &mut Unit, loser: UnitType) {
        let amount = self.data.rules.kill_experience(winner.unit_type, loser);
        let outcome = winner.gain_experience(amount, &self.data.rules.exp_thresholds, &self.data.catalog);
        if outcome.levels_gained > 0 {
            info!("{} reached level {}", winner.unit_type.name(), winner.level);
        }
        if outcome.crowned {
            info!("{} was crowned", winner.unit_type.name());
        }
        if let Some(promoted) = outcome.promoted_to {
            info!("Crowned unit promoted to {}", promoted.name());
        }
    }

    /// Write a resolved copy back by id, or drop it from the roster if it fell
    fn commit_unit(&mut self, unit: Unit) {
        let Some(index) = self.unit_index(unit.id) else {
            return;
        };
        if unit.hp <= 0 {
            info!("{} ({:?}) was defeated", unit.unit_type.name(), unit.faction);
            self.units.remove(index);
            self.movement_paths.remove(&unit.id);
        } else {
            self.units[index] = unit;
        }
    }

    // ------------------------------------------------------------------
    // Menus and clicks
    // ------------------------------------------------------------------

    /// Drop every transient UI intent
    pub fn clear_selection(&mut self) {
        self.ui = UiIntent::default();
    }

    pub fn close_menu(&mut self) {
        self.clear_selection();
    }

    pub fn open_hire_menu(&mut self, king_id: UnitId) -> bool {
        let Some(index) = self.commandable(king_id) else {
            return false;
        };
        if !self.can_hire(&self.units[index]) {
            return false;
        }
        let options = self.data.catalog.hireable.clone();
        self.clear_selection();
        self.ui.selected_unit = Some(king_id);
        self.ui.hire_menu = Some(Menu::new(options));
        true
    }

    pub fn open_context_menu(&mut self, anchor: Position) -> bool {
        if self.is_over() {
            return false;
        }
        self.clear_selection();
        self.ui.context_menu = Some((anchor, Menu::new(vec![ContextAction::EndTurn])));
        true
    }

    /// Move the highlight of whichever menu is open
    pub fn menu_next(&mut self) {
        if let Some(menu) = &mut self.ui.action_menu {
            menu.next();
        } else if let Some(menu) = &mut self.ui.hire_menu {
            menu.next();
        } else if let Some((_, menu)) = &mut self.ui.context_menu {
            menu.next();
        }
    }

    pub fn menu_previous(&mut self) {
        if let Some(menu) = &mut self.ui.action_menu {
            menu.previous();
        } else if let Some(menu) = &mut self.ui.hire_menu {
            menu.previous();
        } else if let Some((_, menu)) = &mut self.ui.context_menu {
            menu.previous();
        }
    }

    /// Run the highlighted action menu entry for the selected unit
    pub fn apply_action_menu_selection(&mut self) -> bool {
        let (Some(id), Some(action)) = (
            self.ui.selected_unit,
            self.ui.action_menu.as_ref().and_then(|m| m.highlighted()),
        ) else {
            return false;
        };
        if !self.action_options(id).contains(&action) {
            return false;
        }
        match action {
            UnitAction::Move => {
                let range = self.movement_range(id);
                self.ui.action_menu = None;
                self.ui.movement_range = range;
                true
            }
            UnitAction::Attack => {
                self.ui.action_menu = None;
                self.ui.movement_range = None;
                self.ui.attack_mode = true;
                true
            }
            UnitAction::Magic => {
                let spell = self.castable_spells(id).first().copied();
                self.ui.action_menu = None;
                self.ui.movement_range = None;
                self.ui.magic_mode = true;
                self.ui.selected_spell = spell;
                true
            }
            UnitAction::Occupy => self.occupy_unit(id),
            UnitAction::Supply => self.supply_unit(id),
            UnitAction::Hire => self.open_hire_menu(id),
            UnitAction::Wait => self.wait_unit(id),
        }
    }

    /// Pick which spell a click in magic mode casts
    pub fn select_spell(&mut self, spell_index: usize) -> bool {
        if !self.ui.magic_mode || self.data.spells.get(spell_index).is_none() {
            return false;
        }
        self.ui.selected_spell = Some(spell_index);
        true
    }

    pub fn apply_hire_menu_selection(&mut self) -> bool {
        let (Some(king_id), Some(unit_type)) = (
            self.ui.selected_unit,
            self.ui.hire_menu.as_ref().and_then(|m| m.highlighted()),
        ) else {
            return false;
        };
        self.hire_unit(king_id, unit_type)
    }

    pub fn apply_context_menu_selection(&mut self) -> bool {
        let Some(action) = self.ui.context_menu.as_ref().and_then(|(_, m)| m.highlighted()) else {
            return false;
        };
        match action {
            ContextAction::EndTurn => self.end_turn(),
        }
    }

    /// Route a click according to the active intent: attack or cast when a
    /// mode is armed, move into the shown range, otherwise select
    pub fn handle_tile_click(&mut self, pos: Position) -> bool {
        if self.is_over() {
            return false;
        }
        self.cursor = pos;
        if self.ui.context_menu.is_some() {
            self.clear_selection();
            return false;
        }

        let clicked = self.unit_at(pos).map(|u| u.id);
        if let Some(selected) = self.ui.selected_unit {
            if self.ui.attack_mode {
                if let Some(target) = clicked {
                    if self.attack_unit(selected, target) {
                        return true;
                    }
                }
                self.clear_selection();
                return false;
            }
            if self.ui.magic_mode {
                if let (Some(target), Some(spell)) = (clicked, self.ui.selected_spell) {
                    if self.cast_spell(selected, spell, target) {
                        return true;
                    }
                }
                self.clear_selection();
                return false;
            }
            let in_range = self
                .ui
                .movement_range
                .as_ref()
                .is_some_and(|range| range.contains(pos));
            if in_range && clicked.is_none() {
                return self.move_unit_to(selected, pos);
            }
        }

        match clicked {
            Some(id) => self.select_unit(id),
            None => {
                self.clear_selection();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{sample_scenario, PropertyOwnership, UnitPlacement};

    fn scenario(layout: &[&str], units: Vec<UnitPlacement>) -> Scenario {
        let mut scenario = sample_scenario();
        scenario.factions.truncate(3);
        scenario.height = layout.len() as u32;
        scenario.width = layout[0].len() as u32;
        scenario.layout = layout.iter().map(|r| r.to_string()).collect();
        scenario.properties.clear();
        scenario.units = units;
        scenario.starting_budget = 0;
        scenario
    }

    fn place(unit_type: UnitType, faction: FactionId, x: i32, y: i32) -> UnitPlacement {
        UnitPlacement { unit_type, faction, x, y }
    }

    fn battle(scenario: &Scenario) -> BattleState {
        BattleState::new(scenario, GameData::load_defaults().unwrap(), GameConfig::default()).unwrap()
    }

    #[test]
    fn first_turn_credits_income_and_reports_it() {
        let mut state = battle(&sample_scenario());
        assert_eq!(state.current_faction(), FactionId::Blue);
        let report = *state.income_report().unwrap();
        // one castle
        assert_eq!(report.castles, 1);
        assert_eq!(report.after, 100 + 10 + 40);
        assert_eq!(state.budget(FactionId::Blue), report.after);
        assert!(matches!(state.pop_effect(), Some(UiEffect::TurnChanged { faction: FactionId::Blue, .. })));
        assert!(state.confirm_income_report());
        assert!(!state.confirm_income_report());
    }

    #[test]
    fn only_current_faction_can_be_selected() {
        let mut state = battle(&sample_scenario());
        let red_king = state.units.iter().find(|u| u.faction == FactionId::Red).unwrap().id;
        assert!(!state.select_unit(red_king));
        assert!(state.select_unit(UnitId(2)));
        assert_eq!(state.ui.selected_unit, Some(UnitId(2)));
        assert!(state.ui.movement_range.is_some());
        let menu = state.ui.action_menu.as_ref().unwrap();
        assert_eq!(menu.options, vec![UnitAction::Move, UnitAction::Wait]);
    }

    #[test]
    fn move_spends_food_by_steps_not_cost() {
        let s = scenario(
            &["GFGGG", "GGGGG", "GGGGG"],
            vec![place(UnitType::Fighter, FactionId::Blue, 0, 0), place(UnitType::King, FactionId::Red, 4, 2)],
        );
        let mut state = battle(&s);
        let food = state.unit(UnitId(1)).unwrap().food;
        // Forest costs 2 move points but one step
        assert!(state.move_unit_to(UnitId(1), Position::new(1, 0)));
        let unit = state.unit(UnitId(1)).unwrap();
        assert_eq!(unit.food, food - 1);
        assert!(unit.moved_this_turn);
        assert!(!state.move_unit_to(UnitId(1), Position::new(2, 0)));

        let paths = state.take_movement_paths();
        assert_eq!(paths[&UnitId(1)], vec![Position::new(0, 0), Position::new(1, 0)]);
        assert!(state.take_movement_paths().is_empty());
    }

    #[test]
    fn move_rejects_unreachable_and_occupied_cells() {
        let s = scenario(
            &["GGGGGG", "GGGGGG"],
            vec![
                place(UnitType::Fighter, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Blue, 1, 0),
                place(UnitType::King, FactionId::Red, 5, 1),
            ],
        );
        let mut state = battle(&s);
        assert!(!state.move_unit_to(UnitId(1), Position::new(1, 0)));
        assert!(!state.move_unit_to(UnitId(1), Position::new(4, 0)));
        assert!(!state.move_unit_to(UnitId(1), Position::new(0, 0)));
        // passes through the friendly unit
        assert!(state.move_unit_to(UnitId(1), Position::new(2, 0)));
    }

    #[test]
    fn food_limits_steps() {
        let s = scenario(
            &["GGGG", "GGGG"],
            vec![place(UnitType::Fighter, FactionId::Blue, 0, 0), place(UnitType::King, FactionId::Red, 3, 1)],
        );
        let mut state = battle(&s);
        state.units[0].food = 1;
        assert!(!state.move_unit_to(UnitId(1), Position::new(2, 0)));
        assert!(state.move_unit_to(UnitId(1), Position::new(1, 0)));
        assert_eq!(state.unit(UnitId(1)).unwrap().food, 0);
    }

    #[test]
    fn attack_applies_result_and_removes_the_defeated() {
        let s = scenario(
            &["GGG", "GGG"],
            vec![
                place(UnitType::King, FactionId::Blue, 0, 0),
                place(UnitType::Mage, FactionId::Red, 1, 0),
                place(UnitType::Fighter, FactionId::Yellow, 2, 1),
            ],
        );
        let mut state = battle(&s);
        state.drain_effects();
        state.units[1].hp = 3;
        assert!(state.attack_unit(UnitId(1), UnitId(2)));
        assert!(state.unit(UnitId(2)).is_none());
        let king = state.unit(UnitId(1)).unwrap();
        assert!(king.acted);
        assert_eq!(king.exp, 10);
        assert_eq!(king.level, 2);
        match state.pop_effect() {
            Some(UiEffect::UnitAttacked { defender_hp_before, defender_hp_after, .. }) => {
                assert_eq!(defender_hp_before, 3);
                assert_eq!(defender_hp_after, 0);
            }
            other => panic!("unexpected effect {:?}", other),
        }
        assert!(!state.attack_unit(UnitId(1), UnitId(3)));
        assert!(state.winner().is_none());
    }

    #[test]
    fn attack_needs_adjacency_and_an_enemy() {
        let s = scenario(
            &["GGGG", "GGGG"],
            vec![
                place(UnitType::King, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Blue, 1, 0),
                place(UnitType::Fighter, FactionId::Red, 3, 0),
            ],
        );
        let mut state = battle(&s);
        assert!(!state.attack_unit(UnitId(1), UnitId(2)));
        assert!(!state.attack_unit(UnitId(1), UnitId(3)));
        assert_eq!(state.units[2].hp, 14);
    }

    #[test]
    fn last_faction_standing_wins_and_freezes_the_game() {
        let s = scenario(
            &["GGG"],
            vec![place(UnitType::King, FactionId::Blue, 0, 0), place(UnitType::Archer, FactionId::Red, 1, 0)],
        );
        let mut state = battle(&s);
        state.units[1].hp = 1;
        assert!(state.attack_unit(UnitId(1), UnitId(2)));
        assert_eq!(state.winner(), Some(FactionId::Blue));
        assert!(!state.end_turn());
        assert!(!state.select_unit(UnitId(1)));
        assert!(!state.handle_tile_click(Position::new(0, 0)));
    }

    #[test]
    fn occupy_town_emits_capture() {
        let s = scenario(
            &["TCG", "GGG"],
            vec![
                place(UnitType::Fighter, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Blue, 1, 0),
                place(UnitType::King, FactionId::Red, 2, 1),
            ],
        );
        let mut state = battle(&s);
        state.drain_effects();
        assert!(!state.occupy_unit(UnitId(2)));
        assert!(state.occupy_unit(UnitId(1)));
        assert!(state.map.get(0, 0).unwrap().is_owned_by(FactionId::Blue));
        assert!(matches!(state.pop_effect(), Some(UiEffect::TileCaptured { x: 0, y: 0, .. })));
        assert!(!state.occupy_unit(UnitId(1)));
    }

    #[test]
    fn hire_respects_budget_and_spawns_next_to_the_king() {
        let mut s = scenario(
            &["GCG", "GGG", "GGG"],
            vec![place(UnitType::King, FactionId::Blue, 1, 0), place(UnitType::King, FactionId::Red, 2, 2)],
        );
        s.properties.push(PropertyOwnership { x: 1, y: 0, owner: FactionId::Red });
        let mut state = battle(&s);
        state.budgets.set(FactionId::Blue, 59);
        assert!(!state.can_hire_unit_type(UnitId(1), UnitType::Fighter));
        assert!(!state.hire_unit(UnitId(1), UnitType::Fighter));
        assert_eq!(state.units.len(), 2);

        state.budgets.set(FactionId::Blue, 60);
        assert!(state.can_hire_unit_type(UnitId(1), UnitType::Fighter));
        assert!(!state.can_hire_unit_type(UnitId(1), UnitType::Archer));
        assert!(!state.can_hire_unit_type(UnitId(1), UnitType::King));
        assert!(!state.can_hire_unit_type(UnitId(2), UnitType::Fighter));
        assert!(state.hire_unit(UnitId(1), UnitType::Fighter));
        assert_eq!(state.budget(FactionId::Blue), 0);
        let hired = state.units.last().unwrap();
        assert_eq!(hired.id, UnitId(3));
        // up is off the map, down is free
        assert_eq!(hired.position(), Position::new(1, 1));
        assert!(hired.acted);
        assert!(!state.unit(UnitId(1)).unwrap().acted);
    }

    #[test]
    fn acted_king_on_castle_may_still_hire() {
        let s = scenario(
            &["GCG", "GGG", "GGG"],
            vec![place(UnitType::King, FactionId::Blue, 1, 0), place(UnitType::King, FactionId::Red, 2, 2)],
        );
        let mut state = battle(&s);
        state.budgets.set(FactionId::Blue, 200);
        assert!(state.occupy_unit(UnitId(1)));
        assert!(state.select_unit(UnitId(1)));
        assert_eq!(state.ui.action_menu.as_ref().unwrap().options, vec![UnitAction::Hire]);
        assert!(state.apply_action_menu_selection());
        assert!(state.ui.hire_menu.is_some());
        state.menu_next();
        assert!(state.apply_hire_menu_selection());
        assert_eq!(state.units.last().unwrap().unit_type, UnitType::Archer);
        assert_eq!(state.budget(FactionId::Blue), 130);
        assert!(state.ui.is_clear());
    }

    #[test]
    fn hiring_can_cost_the_kings_action() {
        let s = scenario(
            &["GCG", "GGG", "GGG"],
            vec![place(UnitType::King, FactionId::Blue, 1, 0), place(UnitType::King, FactionId::Red, 2, 2)],
        );
        let mut state = battle(&s);
        state.data.rules.hire_consumes_action = true;
        state.budgets.set(FactionId::Blue, 200);

        assert!(state.hire_unit(UnitId(1), UnitType::Fighter));
        assert!(state.unit(UnitId(1)).unwrap().acted);
        assert_eq!(state.budget(FactionId::Blue), 140);

        assert!(!state.can_hire_unit_type(UnitId(1), UnitType::Fighter));
        assert!(!state.hire_unit(UnitId(1), UnitType::Fighter));
        assert!(!state.select_unit(UnitId(1)));
        assert_eq!(state.budget(FactionId::Blue), 140);
        assert_eq!(state.units.len(), 3);
    }

    #[test]
    fn hire_menu_highlight_wraps_both_ways() {
        let s = scenario(
            &["GCG", "GGG", "GGG"],
            vec![place(UnitType::King, FactionId::Blue, 1, 0), place(UnitType::King, FactionId::Red, 2, 2)],
        );
        let mut state = battle(&s);
        state.budgets.set(FactionId::Blue, 200);
        let hireable = state.data.catalog.hireable.clone();

        assert!(state.open_hire_menu(UnitId(1)));
        state.menu_previous();
        assert_eq!(state.ui.hire_menu.as_ref().unwrap().highlighted(), hireable.last().copied());
        state.menu_next();
        assert_eq!(state.ui.hire_menu.as_ref().unwrap().highlighted(), Some(hireable[0]));

        state.close_menu();
        assert!(state.ui.is_clear());
        assert!(!state.apply_hire_menu_selection());
        assert_eq!(state.units.len(), 2);
    }

    #[test]
    fn supply_at_capacity_is_a_no_op() {
        let mut s = scenario(
            &["TGG", "GGG"],
            vec![place(UnitType::Fighter, FactionId::Blue, 0, 0), place(UnitType::King, FactionId::Red, 2, 1)],
        );
        s.properties.push(PropertyOwnership { x: 0, y: 0, owner: FactionId::Blue });
        let mut state = battle(&s);
        let budget = state.budget(FactionId::Blue);
        assert!(!state.supply_unit(UnitId(1)));
        assert!(!state.unit(UnitId(1)).unwrap().acted);
        assert_eq!(state.budget(FactionId::Blue), budget);

        state.units[0].hp -= 2;
        assert!(state.supply_unit(UnitId(1)));
        assert_eq!(state.budget(FactionId::Blue), budget - 6);
        assert!(state.unit(UnitId(1)).unwrap().acted);
    }

    #[test]
    fn end_turn_resets_only_the_incoming_faction() {
        let s = scenario(
            &["GGGGG", "GGGGG"],
            vec![place(UnitType::King, FactionId::Blue, 0, 0), place(UnitType::King, FactionId::Red, 4, 1)],
        );
        let mut state = battle(&s);
        assert!(state.wait_unit(UnitId(1)));
        assert!(state.end_turn());
        assert_eq!(state.current_faction(), FactionId::Red);
        assert!(state.unit(UnitId(1)).unwrap().acted);
        // Yellow has no units and is skipped; the wrap starts round 2
        assert!(state.end_turn());
        assert_eq!(state.current_faction(), FactionId::Blue);
        assert_eq!(state.turn.round_count, 2);
        assert!(!state.unit(UnitId(1)).unwrap().acted);
    }

    #[test]
    fn ending_the_turn_clears_ui_intent() {
        let mut state = battle(&sample_scenario());
        assert!(state.select_unit(UnitId(2)));
        assert!(state.apply_action_menu_selection());
        assert!(state.ui.movement_range.is_some());
        assert!(state.open_context_menu(Position::new(4, 4)));
        assert!(state.ui.selected_unit.is_none());
        assert!(state.apply_context_menu_selection());
        assert!(state.ui.is_clear());
        assert_eq!(state.current_faction(), FactionId::Red);
    }

    #[test]
    fn clicks_select_then_move() {
        let s = scenario(
            &["GGGGG", "GGGGG"],
            vec![place(UnitType::Fighter, FactionId::Blue, 0, 0), place(UnitType::King, FactionId::Red, 4, 1)],
        );
        let mut state = battle(&s);
        assert!(state.handle_tile_click(Position::new(0, 0)));
        assert!(state.handle_tile_click(Position::new(1, 0)));
        assert_eq!(state.unit(UnitId(1)).unwrap().position(), Position::new(1, 0));
        assert_eq!(state.ui.selected_unit, Some(UnitId(1)));
        assert!(!state.ui.action_menu.as_ref().unwrap().options.contains(&UnitAction::Move));
        assert!(!state.handle_tile_click(Position::new(3, 0)));
        assert!(state.ui.is_clear());
    }

    #[test]
    fn attack_mode_click_strikes_the_target() {
        let s = scenario(
            &["GGG", "GGG"],
            vec![place(UnitType::King, FactionId::Blue, 0, 0), place(UnitType::Fighter, FactionId::Red, 1, 1)],
        );
        let mut state = battle(&s);
        assert!(state.select_unit(UnitId(1)));
        let menu = state.ui.action_menu.as_mut().unwrap();
        let attack = menu.options.iter().position(|a| *a == UnitAction::Attack).unwrap();
        menu.highlight(attack);
        assert!(state.apply_action_menu_selection());
        assert!(state.ui.attack_mode);
        assert!(state.handle_tile_click(Position::new(1, 1)));
        assert_eq!(state.unit(UnitId(2)).unwrap().hp, 14 - 6);
    }

    #[test]
    fn failed_attack_click_leaves_attack_mode() {
        let s = scenario(
            &["GGG", "GGG"],
            vec![
                place(UnitType::King, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Blue, 0, 1),
                place(UnitType::Fighter, FactionId::Red, 1, 1),
            ],
        );
        let mut state = battle(&s);
        let arm = |state: &mut BattleState| {
            assert!(state.select_unit(UnitId(1)));
            let menu = state.ui.action_menu.as_mut().unwrap();
            let attack = menu.options.iter().position(|a| *a == UnitAction::Attack).unwrap();
            menu.highlight(attack);
            assert!(state.apply_action_menu_selection());
            assert!(state.ui.attack_mode);
        };

        arm(&mut state);
        assert!(!state.handle_tile_click(Position::new(0, 1)));
        assert!(state.ui.is_clear());
        assert_eq!(state.unit(UnitId(2)).unwrap().hp, 14);
        assert!(!state.unit(UnitId(1)).unwrap().acted);

        arm(&mut state);
        assert!(state.handle_tile_click(Position::new(1, 1)));
        assert!(state.unit(UnitId(3)).unwrap().hp < 14);
    }

    #[test]
    fn magic_mode_click_casts_the_selected_spell() {
        let s = scenario(
            &["GGGGG", "GGGGG"],
            vec![
                place(UnitType::Mage, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Red, 2, 0),
                place(UnitType::King, FactionId::Red, 4, 1),
            ],
        );
        let mut state = battle(&s);
        let blast = state.data.spells.spells.iter().position(|s| s.id == "blast").unwrap();
        let renew = state.data.spells.spells.iter().position(|s| s.id == "renew").unwrap();
        assert!(!state.select_spell(blast));

        let arm = |state: &mut BattleState| {
            assert!(state.select_unit(UnitId(1)));
            assert_eq!(
                state.ui.action_menu.as_ref().unwrap().options,
                vec![UnitAction::Move, UnitAction::Magic, UnitAction::Wait]
            );
            state.menu_next();
            assert!(state.apply_action_menu_selection());
            assert!(state.ui.magic_mode);
        };

        // Renew only lands on the caster, so aiming it at the fighter fails
        arm(&mut state);
        assert_eq!(state.ui.selected_spell, Some(blast));
        assert!(state.select_spell(renew));
        assert!(!state.select_spell(99));
        assert!(!state.handle_tile_click(Position::new(2, 0)));
        assert!(state.ui.is_clear());
        assert_eq!(state.unit(UnitId(2)).unwrap().hp, 14);
        assert!(!state.unit(UnitId(1)).unwrap().acted);

        arm(&mut state);
        state.drain_effects();
        assert!(state.handle_tile_click(Position::new(2, 0)));
        assert_eq!(state.unit(UnitId(2)).unwrap().hp, 14 - 6);
        assert!(state.unit(UnitId(1)).unwrap().acted);
        assert!(state.ui.is_clear());
        assert!(matches!(
            state.pop_effect(),
            Some(UiEffect::SpellCast { target_hp_before: 14, target_hp_after: 8, .. })
        ));
    }

    #[test]
    fn mage_heals_an_ally_and_only_casters_cast() {
        let s = scenario(
            &["GGGG", "GGGG"],
            vec![
                place(UnitType::Mage, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Blue, 2, 0),
                place(UnitType::King, FactionId::Red, 3, 1),
            ],
        );
        let mut state = battle(&s);
        let heal = state.data.spells.spells.iter().position(|s| s.id == "heal").unwrap();
        let blast = state.data.spells.spells.iter().position(|s| s.id == "blast").unwrap();
        state.units[1].hp = 4;
        assert!(!state.cast_spell(UnitId(2), heal, UnitId(2)));
        assert!(state.cast_spell(UnitId(1), heal, UnitId(2)));
        assert_eq!(state.unit(UnitId(2)).unwrap().hp, 10);
        assert!(state.unit(UnitId(1)).unwrap().acted);
        assert!(!state.cast_spell(UnitId(1), blast, UnitId(3)));
    }

    #[test]
    fn blast_kill_grants_experience() {
        let s = scenario(
            &["GGGG", "GGGG"],
            vec![
                place(UnitType::Mage, FactionId::Blue, 0, 0),
                place(UnitType::Fighter, FactionId::Red, 3, 0),
                place(UnitType::Fighter, FactionId::Yellow, 3, 1),
            ],
        );
        let mut state = battle(&s);
        let blast = state.data.spells.spells.iter().position(|s| s.id == "blast").unwrap();
        state.units[1].hp = 5;
        assert!(state.cast_spell(UnitId(1), blast, UnitId(2)));
        assert!(state.unit(UnitId(2)).is_none());
        assert_eq!(state.unit(UnitId(1)).unwrap().exp, 10);
    }
}
