use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{BattleState, FactionId, TileType, UnitId, UnitType};

/// A notification for the presentation layer. Enqueued in the order the
/// events happen and drained by whoever animates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiEffect {
    TurnChanged {
        faction: FactionId,
        label: String,
        color: [f32; 3],
    },
    UnitAttacked {
        attacker_id: UnitId,
        defender_id: UnitId,
        attacker_type: UnitType,
        defender_type: UnitType,
        attacker_faction: FactionId,
        defender_faction: FactionId,
        attacker_hp_before: i32,
        attacker_hp_after: i32,
        defender_hp_before: i32,
        defender_hp_after: i32,
    },
    TileCaptured {
        x: i32,
        y: i32,
        faction: FactionId,
        tile_type: TileType,
    },
    UnitHired {
        x: i32,
        y: i32,
        unit_type: UnitType,
        faction: FactionId,
    },
    SpellCast {
        caster_id: UnitId,
        target_id: UnitId,
        spell: String,
        target_hp_before: i32,
        target_hp_after: i32,
    },
}

/// FIFO of pending effects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectQueue {
    pending: VecDeque<UiEffect>,
}

impl EffectQueue {
    pub fn push(&mut self, effect: UiEffect) {
        self.pending.push_back(effect);
    }

    pub fn pop(&mut self) -> Option<UiEffect> {
        self.pending.pop_front()
    }

    pub fn drain(&mut self) -> Vec<UiEffect> {
        self.pending.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UiEffect> {
        self.pending.iter()
    }
}

/// Consume pending effects and committed paths. Without a renderer they
/// are only logged.
pub fn present_effects(mut battle: ResMut<BattleState>) {
    for effect in battle.drain_effects() {
        match &effect {
            UiEffect::TurnChanged { label, .. } => debug!("Effect: turn banner for {}", label),
            UiEffect::UnitAttacked {
                attacker_type,
                defender_type,
                defender_hp_before,
                defender_hp_after,
                ..
            } => debug!(
                "Effect: {} hits {} ({} -> {})",
                attacker_type.name(),
                defender_type.name(),
                defender_hp_before,
                defender_hp_after
            ),
            UiEffect::TileCaptured { x, y, faction, .. } => {
                debug!("Effect: {:?} captured ({}, {})", faction, x, y)
            }
            UiEffect::UnitHired { unit_type, x, y, .. } => {
                debug!("Effect: {} arrives at ({}, {})", unit_type.name(), x, y)
            }
            UiEffect::SpellCast { spell, target_hp_after, .. } => {
                debug!("Effect: {} lands, target at {} hp", spell, target_hp_after)
            }
        }
    }
    for (unit, path) in battle.take_movement_paths() {
        debug!("Path for unit {}: {} cells", unit.0, path.len());
    }
}
