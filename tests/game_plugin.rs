//! The plugin stack running headless: loading, CPU pacing, human turns and game over.

mod common;

use bevy::prelude::*;

use castle_tactics::game::{
    sample_scenario, AiState, BattleState, FactionId, GameConfig, Position, UnitId, UnitType,
};
use castle_tactics::states::GameState;
use common::{game_state, headless_app, place, small_scenario, update_until};

#[test]
fn loading_builds_the_battle() {
    let mut app = headless_app(sample_scenario(), GameConfig::all_cpu());
    assert!(update_until(&mut app, 5, |app| game_state(app) == GameState::Battle));

    let battle = app.world().resource::<BattleState>();
    assert_eq!(battle.faction_order().len(), 4);
    assert!(app.world().contains_resource::<AiState>());
}

#[test]
fn bad_scenario_stays_in_loading() {
    let mut scenario = sample_scenario();
    scenario.units.push(scenario.units[0].clone());
    let mut app = headless_app(scenario, GameConfig::all_cpu());
    for _ in 0..5 {
        app.update();
    }
    assert_eq!(game_state(&app), GameState::Loading);
    assert!(!app.world().contains_resource::<BattleState>());
}

#[test]
fn cpu_factions_play_whole_rounds() {
    let mut app = headless_app(sample_scenario(), GameConfig::all_cpu());
    let advanced = update_until(&mut app, 5_000, |app| {
        app.world()
            .get_resource::<BattleState>()
            .is_some_and(|battle| battle.turn.round_count >= 2 || battle.is_over())
    });
    assert!(advanced);
    let battle = app.world().resource::<BattleState>();
    assert!(battle.effects().is_empty());
}

#[test]
fn human_turn_waits_for_input() {
    let mut app = headless_app(sample_scenario(), GameConfig::default());
    for _ in 0..50 {
        app.update();
    }
    let battle = app.world().resource::<BattleState>();
    assert_eq!(battle.current_faction(), FactionId::Blue);
    assert_eq!(battle.turn.round_count, 1);
    // the income summary is never dismissed on a human's behalf
    assert!(battle.income_report().is_some());
    assert!(battle.units.iter().all(|u| !u.acted));
}

#[test]
fn auto_mode_plays_the_human_army_but_not_the_king() {
    let mut app = headless_app(sample_scenario(), GameConfig::default());
    assert!(update_until(&mut app, 5, |app| game_state(app) == GameState::Battle));

    app.world_mut().resource_mut::<BattleState>().confirm_income_report();
    let enabled = app
        .world_mut()
        .resource_scope(|world, mut ai: Mut<AiState>| ai.toggle_auto_mode(world.resource::<BattleState>()));
    assert!(enabled);

    assert!(update_until(&mut app, 200, |app| !app.world().resource::<AiState>().auto_mode));

    let battle = app.world().resource::<BattleState>();
    assert_eq!(battle.current_faction(), FactionId::Blue);
    assert!(!battle.unit(UnitId(1)).unwrap().acted);
    let fighter = battle.unit(UnitId(2)).unwrap();
    assert!(fighter.acted);
    assert_eq!(fighter.position(), Position::new(3, 2));
    assert!(battle.map.get(3, 2).unwrap().is_owned_by(FactionId::Blue));
}

#[test]
fn ending_a_human_turn_hands_over_to_the_cpu() {
    let mut app = headless_app(sample_scenario(), GameConfig::default());
    assert!(update_until(&mut app, 5, |app| game_state(app) == GameState::Battle));

    let ended = app
        .world_mut()
        .resource_scope(|world, mut ai: Mut<AiState>| {
            let mut battle = world.resource_mut::<BattleState>();
            ai.request_end_turn(&mut battle)
        });
    assert!(ended);

    let back_to_blue = update_until(&mut app, 5_000, |app| {
        app.world().resource::<BattleState>().current_faction() == FactionId::Blue
    });
    assert!(back_to_blue);
    assert_eq!(app.world().resource::<BattleState>().turn.round_count, 2);
}

#[test]
fn last_faction_standing_ends_the_game() {
    let s = small_scenario(
        &["GGG"],
        vec![place(UnitType::King, FactionId::Blue, 0, 0), place(UnitType::Mage, FactionId::Red, 1, 0)],
    );
    let mut app = headless_app(s, GameConfig::all_cpu());
    assert!(update_until(&mut app, 200, |app| game_state(app) == GameState::GameOver));
    assert_eq!(app.world().resource::<BattleState>().winner(), Some(FactionId::Blue));
}
