use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{BattleState, FactionId};
use crate::states::GameState;

pub struct TurnPlugin;

impl Plugin for TurnPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            check_victory_condition.run_if(in_state(GameState::Battle)),
        )
        .add_systems(OnEnter(GameState::GameOver), announce_winner);
    }
}

/// Whose turn it is and how many full rounds have started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// Index into the scenario's faction order
    pub faction_index: usize,
    pub current_faction: FactionId,
    /// Starts at 1, increments each time the order wraps
    pub round_count: u32,
}

impl TurnState {
    /// First faction in `order` that can act. Falls back to the head of the
    /// order when nobody has units.
    pub fn first(order: &[FactionId], can_act: impl Fn(FactionId) -> bool) -> Option<Self> {
        let head = *order.first()?;
        let (faction_index, current_faction) = order
            .iter()
            .copied()
            .enumerate()
            .find(|(_, f)| can_act(*f))
            .unwrap_or((0, head));
        Some(Self {
            faction_index,
            current_faction,
            round_count: 1,
        })
    }

    /// Move to the next faction in order that can act. Returns false when no
    /// faction can.
    pub fn advance(&mut self, order: &[FactionId], can_act: impl Fn(FactionId) -> bool) -> bool {
        let len = order.len();
        for offset in 1..=len {
            let index = (self.faction_index + offset) % len;
            let faction = order[index];
            if !can_act(faction) {
                continue;
            }
            if index <= self.faction_index {
                self.round_count += 1;
            }
            self.faction_index = index;
            self.current_faction = faction;
            return true;
        }
        false
    }
}

fn check_victory_condition(battle: Res<BattleState>, mut next_state: ResMut<NextState<GameState>>) {
    if battle.winner().is_some() {
        next_state.set(GameState::GameOver);
    }
}

fn announce_winner(battle: Res<BattleState>) {
    match battle.winner() {
        Some(winner) => info!(
            "{} wins in round {}!",
            battle.faction_name(winner),
            battle.turn.round_count
        ),
        None => info!("Battle ended without a winner"),
    }
}
