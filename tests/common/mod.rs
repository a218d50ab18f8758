#![allow(dead_code)]

use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

use castle_tactics::game::{
    sample_scenario, BattleSetup, BattleState, FactionId, GameConfig, GameData, GamePlugin, Scenario,
    UnitPlacement, UnitType,
};
use castle_tactics::states::GameState;

/// Two-faction scenario (Blue, Red) with no starting money or owned property
pub fn small_scenario(layout: &[&str], units: Vec<UnitPlacement>) -> Scenario {
    let mut scenario = sample_scenario();
    scenario.id = "test".to_string();
    scenario.factions.truncate(2);
    scenario.height = layout.len() as u32;
    scenario.width = layout[0].len() as u32;
    scenario.layout = layout.iter().map(|row| row.to_string()).collect();
    scenario.properties.clear();
    scenario.units = units;
    scenario.starting_budget = 0;
    scenario
}

pub fn place(unit_type: UnitType, faction: FactionId, x: i32, y: i32) -> UnitPlacement {
    UnitPlacement { unit_type, faction, x, y }
}

pub fn battle(scenario: &Scenario, config: GameConfig) -> BattleState {
    BattleState::new(scenario, GameData::load_defaults().unwrap(), config).unwrap()
}

/// Headless app advancing 500ms of game time per update
pub fn headless_app(scenario: Scenario, config: GameConfig) -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, StatesPlugin))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(500)))
        .init_state::<GameState>()
        .add_plugins(GamePlugin::new(BattleSetup {
            scenario,
            config,
            data_dir: None,
        }));
    app.finish();
    app.cleanup();
    app
}

pub fn game_state(app: &App) -> GameState {
    app.world().resource::<State<GameState>>().get().clone()
}

/// Update until `done` holds, returning false if it never does within `max_frames`
pub fn update_until(app: &mut App, max_frames: u32, done: impl Fn(&App) -> bool) -> bool {
    for _ in 0..max_frames {
        app.update();
        if done(app) {
            return true;
        }
    }
    false
}
