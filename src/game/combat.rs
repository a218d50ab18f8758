use super::{GameMap, RulesConfig, TileType, Unit};

/// One resolved attack exchange. Both combatants are fresh copies; nothing
/// in the roster is touched until the caller commits them.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleOutcome {
    pub attacker: Unit,
    pub defender: Unit,
    pub attacker_defeated: bool,
    pub defender_defeated: bool,
    pub damage: i32,
    pub counter_damage: Option<i32>,
    pub log: Vec<String>,
}

/// Damage of a single strike:
/// `max(1, (power + level * level_bonus_attack) - (defense + terrain + level * level_bonus_defense))`
pub fn calculate_damage(attacker: &Unit, defender: &Unit, map: &GameMap, rules: &RulesConfig) -> i32 {
    let terrain = map
        .tile_type(defender.x, defender.y)
        .unwrap_or(TileType::Grass)
        .defense_bonus();
    let power = attacker.power + attacker.level as i32 * rules.level_bonus_attack;
    let defense = defender.defense + terrain + defender.level as i32 * rules.level_bonus_defense;
    (power - defense).max(1)
}

/// Attacker strikes first; a surviving defender strikes back when the
/// attacker stands within its reach.
pub fn resolve(attacker: &Unit, defender: &Unit, map: &GameMap, rules: &RulesConfig) -> BattleOutcome {
    let mut attacker_after = attacker.clone();
    let mut defender_after = defender.clone();
    let mut log = Vec::new();

    let damage = calculate_damage(&attacker_after, &defender_after, map, rules);
    defender_after.hp -= damage;
    log.push(format!(
        "{} attacks {} ({} dmg)",
        attacker_after.unit_type.name(),
        defender_after.unit_type.name(),
        damage
    ));

    let mut counter_damage = None;
    if defender_after.hp > 0 && defender_after.reaches(attacker_after.position()) {
        let counter = calculate_damage(&defender_after, &attacker_after, map, rules);
        attacker_after.hp -= counter;
        counter_damage = Some(counter);
        log.push(format!(
            "{} counterattacks {} ({} dmg)",
            defender_after.unit_type.name(),
            attacker_after.unit_type.name(),
            counter
        ));
    }

    BattleOutcome {
        attacker_defeated: attacker_after.hp <= 0,
        defender_defeated: defender_after.hp <= 0,
        attacker: attacker_after,
        defender: defender_after,
        damage,
        counter_damage,
        log,
    }
}
