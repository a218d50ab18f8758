use bevy::prelude::*;

use super::{
    can_hire_at, can_occupy_at, can_supply_at, present_effects, BattleState, ControllerType,
    FactionId, Position, Unit, UnitId,
};
use crate::states::GameState;

pub struct AiPlugin;

impl Plugin for AiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AiState>().add_systems(
            Update,
            ai_turn_system
                .after(present_effects)
                .run_if(in_state(GameState::Battle)),
        );
    }
}

/// Knobs for one AI step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuStepOptions {
    /// Faction to act for; defaults to the current one
    pub faction: Option<FactionId>,
    pub skip_kings: bool,
    pub allow_hire: bool,
    pub allow_end_turn: bool,
    /// A King standing on a castle stays there
    pub lock_king_on_castle: bool,
}

impl Default for CpuStepOptions {
    fn default() -> Self {
        Self {
            faction: None,
            skip_kings: false,
            allow_hire: true,
            allow_end_turn: true,
            lock_king_on_castle: false,
        }
    }
}

impl CpuStepOptions {
    /// A computer-controlled faction's own turn
    pub fn cpu_turn() -> Self {
        Self {
            lock_king_on_castle: true,
            ..Default::default()
        }
    }

    /// A human faction's units handed to the AI; Kings and the turn stay
    /// with the player
    pub fn auto_mode(faction: FactionId) -> Self {
        Self {
            faction: Some(faction),
            skip_kings: true,
            allow_hire: false,
            allow_end_turn: false,
            lock_king_on_castle: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AiStepOutcome {
    pub acted: bool,
    pub focus_unit: Option<UnitId>,
    pub turn_ended: bool,
}

impl AiStepOutcome {
    fn acted(unit: UnitId) -> Self {
        Self {
            acted: true,
            focus_unit: Some(unit),
            turn_ended: false,
        }
    }

    /// Whether calling the step again can do anything this turn
    pub fn has_more_work(&self) -> bool {
        self.acted
    }
}

/// Advance one unit of the acting faction through the priority ladder, or
/// end the turn when nobody is left to act.
pub fn run_cpu_turn_step(state: &mut BattleState, options: &CpuStepOptions) -> AiStepOutcome {
    if state.is_over() {
        return AiStepOutcome::default();
    }
    state.clear_selection();

    let faction = options.faction.unwrap_or(state.current_faction());
    if faction != state.current_faction() {
        return AiStepOutcome::default();
    }

    let next = state
        .units
        .iter()
        .find(|u| u.faction == faction && !u.acted && !(options.skip_kings && u.unit_type.is_king()))
        .cloned();
    if let Some(unit) = next {
        return step_unit(state, unit, options);
    }

    if !options.allow_end_turn {
        return AiStepOutcome::default();
    }
    debug!("CPU: {} has nothing left to do", state.faction_name(faction));
    state.end_turn();
    AiStepOutcome {
        acted: false,
        focus_unit: None,
        turn_ended: true,
    }
}

fn step_unit(state: &mut BattleState, unit: Unit, options: &CpuStepOptions) -> AiStepOutcome {
    let id = unit.id;

    if let Some(enemy) = state.adjacent_enemy(&unit).map(|e| e.id) {
        if !state.attack_unit(id, enemy) {
            state.finish_unit(id);
        }
        return AiStepOutcome::acted(id);
    }

    if can_occupy_at(&state.map, &unit) {
        if !state.occupy_unit(id) {
            state.finish_unit(id);
        }
        return AiStepOutcome::acted(id);
    }

    if options.allow_hire {
        if let Some(king) = try_hire(state, unit.faction) {
            return AiStepOutcome::acted(king);
        }
    }

    if (unit.is_damaged() || unit.is_hungry())
        && can_supply_at(&state.map, &unit)
        && state.supply_unit(id)
    {
        return AiStepOutcome::acted(id);
    }

    if unit.food == 0 || unit.moved_this_turn {
        state.finish_unit(id);
        return AiStepOutcome::acted(id);
    }

    if options.lock_king_on_castle && can_hire_at(&state.map, &unit) {
        state.finish_unit(id);
        return AiStepOutcome::acted(id);
    }

    let Some(target) = pick_move_target(state, &unit) else {
        state.finish_unit(id);
        return AiStepOutcome::acted(id);
    };
    if !state.move_unit_to(id, target) {
        state.finish_unit(id);
        return AiStepOutcome::acted(id);
    }

    let Some(moved) = state.unit(id).cloned() else {
        return AiStepOutcome::acted(id);
    };
    if let Some(enemy) = state.adjacent_enemy(&moved).map(|e| e.id) {
        if !state.attack_unit(id, enemy) {
            state.finish_unit(id);
        }
        return AiStepOutcome::acted(id);
    }
    if can_occupy_at(&state.map, &moved) && state.occupy_unit(id) {
        return AiStepOutcome::acted(id);
    }
    state.finish_unit(id);
    AiStepOutcome::acted(id)
}

/// Hire the cheapest affordable type at the first King on a castle.
/// Returns the hiring King.
fn try_hire(state: &mut BattleState, faction: FactionId) -> Option<UnitId> {
    if state.cpu_hires_remaining() == 0 {
        return None;
    }
    let kings: Vec<UnitId> = state
        .units
        .iter()
        .filter(|u| u.faction == faction && can_hire_at(&state.map, u))
        .map(|u| u.id)
        .collect();
    if kings.is_empty() {
        return None;
    }

    let budget = state.budget(faction);
    let Some((unit_type, cost)) = state.data.catalog.cheapest_affordable(budget) else {
        debug!("CPU hire: {:?} cannot afford anything with {}", faction, budget);
        return None;
    };

    for king in kings {
        if state.hire_unit(king, unit_type) {
            state.consume_cpu_hire();
            info!(
                "CPU hire: {} hired {} cost={}",
                state.faction_name(faction),
                unit_type.name(),
                cost
            );
            return Some(king);
        }
    }
    debug!("CPU hire: no free cell next to any {:?} King", faction);
    None
}

/// Targets the unit should close in on, with their priority (lower is
/// more urgent)
fn target_points(state: &BattleState, unit: &Unit) -> Vec<(Position, i64)> {
    let enemies = state
        .units
        .iter()
        .filter(|other| other.faction != unit.faction)
        .map(|other| (other.position(), 0));
    let structures = state
        .map
        .structures()
        .filter(|(_, tile)| !tile.is_owned_by(unit.faction))
        .map(|(pos, tile)| (pos, if tile.owner().is_none() { 2 } else { 1 }));
    enemies.chain(structures).collect()
}

/// Reachable cell minimising `10 * distance to nearest target + priority`,
/// with bonuses for cells that can be occupied or that touch an enemy
pub fn pick_move_target(state: &BattleState, unit: &Unit) -> Option<Position> {
    let range = state.movement_range(unit.id)?;
    let targets = target_points(state, unit);
    if targets.is_empty() {
        return None;
    }

    let start = unit.position();
    let mut best: Option<(Position, i64)> = None;
    for pos in range.positions() {
        if pos == start {
            continue;
        }
        let mut score = targets
            .iter()
            .map(|(target, priority)| target.manhattan(pos) as i64 * 10 + priority)
            .min()
            .unwrap_or(i64::MAX);

        let mut there = unit.clone();
        there.x = pos.x;
        there.y = pos.y;
        if can_occupy_at(&state.map, &there) {
            score -= 3;
        }
        if state.enemy_adjacent_to(pos, unit.faction).is_some() {
            score -= 2;
        }

        if best.map_or(true, |(_, s)| score < s) {
            best = Some((pos, score));
        }
    }
    best.map(|(pos, _)| pos)
}

/// Pacing for AI steps
#[derive(Resource)]
pub struct AiState {
    pub enabled: bool,
    pub action_delay: Timer,
    /// A human faction's non-King units are played by the AI
    pub auto_mode: bool,
    pub focus_unit: Option<UnitId>,
}

impl Default for AiState {
    fn default() -> Self {
        Self::with_delay(1.0)
    }
}

impl AiState {
    /// The first step may run immediately; later steps wait `secs`
    pub fn with_delay(secs: f32) -> Self {
        let mut action_delay = Timer::from_seconds(secs, TimerMode::Once);
        let full = action_delay.duration();
        action_delay.tick(full);
        Self {
            enabled: true,
            action_delay,
            auto_mode: false,
            focus_unit: None,
        }
    }

    /// Toggle auto mode for the human player whose turn it is
    pub fn toggle_auto_mode(&mut self, battle: &BattleState) -> bool {
        if battle.current_controller() != ControllerType::Human {
            self.auto_mode = false;
            return false;
        }
        self.auto_mode = !self.auto_mode;
        if !self.auto_mode {
            self.focus_unit = None;
        }
        self.auto_mode
    }

    /// End the turn on behalf of a human player
    pub fn request_end_turn(&mut self, battle: &mut BattleState) -> bool {
        if battle.current_controller() != ControllerType::Human {
            return false;
        }
        self.auto_mode = false;
        battle.clear_selection();
        battle.end_turn()
    }
}

fn ai_turn_system(time: Res<Time>, mut battle: ResMut<BattleState>, mut ai_state: ResMut<AiState>) {
    if battle.is_over() || !ai_state.enabled {
        return;
    }

    let cpu_turn = battle.current_controller() == ControllerType::Cpu;
    if cpu_turn {
        ai_state.auto_mode = false;
        battle.confirm_income_report();
    } else if !ai_state.auto_mode {
        ai_state.focus_unit = None;
        return;
    }

    ai_state.action_delay.tick(time.delta());
    let blocked = !battle.effects().is_empty() || battle.income_report().is_some();
    if blocked || !ai_state.action_delay.finished() {
        return;
    }

    let options = if cpu_turn {
        CpuStepOptions::cpu_turn()
    } else {
        CpuStepOptions::auto_mode(battle.current_faction())
    };
    let outcome = run_cpu_turn_step(&mut battle, &options);

    if let Some(id) = outcome.focus_unit {
        ai_state.focus_unit = Some(id);
        if let Some(pos) = battle.unit(id).map(|u| u.position()) {
            battle.cursor = pos;
        }
    }
    if outcome.acted {
        ai_state.action_delay.reset();
    } else if !cpu_turn {
        info!("Auto mode finished");
        ai_state.auto_mode = false;
        ai_state.focus_unit = None;
    }
    if outcome.turn_ended {
        ai_state.focus_unit = None;
    }
}
