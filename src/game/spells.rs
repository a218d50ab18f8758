use serde::{Deserialize, Serialize};

use super::{Position, Unit};

/// Which units a spell may be aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellTarget {
    Ally,
    Enemy,
    SelfOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellEffect {
    Damage(i32),
    Heal(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub id: String,
    pub name: String,
    pub target: SpellTarget,
    /// Chebyshev reach from the caster
    pub range: u32,
    pub effect: SpellEffect,
}

impl Spell {
    /// Whether `target` is a legal mark for `caster`
    pub fn can_target(&self, caster: &Unit, target: &Unit) -> bool {
        let relation_ok = match self.target {
            SpellTarget::SelfOnly => caster.id == target.id,
            SpellTarget::Ally => caster.faction == target.faction && caster.id != target.id,
            SpellTarget::Enemy => caster.faction != target.faction,
        };
        relation_ok && self.in_range(caster.position(), target.position())
    }

    pub fn in_range(&self, from: Position, to: Position) -> bool {
        from.chebyshev(to) <= self.range
    }

    /// The target after the spell lands. Never mutates the input.
    pub fn apply(&self, target: &Unit) -> Unit {
        let mut after = target.clone();
        match self.effect {
            SpellEffect::Damage(amount) => after.hp = (after.hp - amount).max(0),
            SpellEffect::Heal(amount) => after.hp = (after.hp + amount).min(after.max_hp),
        }
        after
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpellBook {
    pub spells: Vec<Spell>,
}

impl SpellBook {
    pub fn get(&self, index: usize) -> Option<&Spell> {
        self.spells.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Spell> {
        self.spells.iter().find(|s| s.id == id)
    }
}
