use bevy::prelude::*;
use std::path::PathBuf;

mod map;
mod unit;
mod faction;
mod data;
mod spells;
mod scenario;
mod movement;
mod combat;
mod economy;
mod effects;
mod turn;
mod state;
mod ai;

pub use map::*;
pub use unit::*;
pub use faction::*;
pub use data::*;
pub use spells::*;
pub use scenario::*;
pub use movement::*;
pub use combat::*;
pub use economy::*;
pub use effects::*;
pub use turn::*;
pub use state::*;
pub use ai::*;

use crate::states::GameState;

/// What the loading state builds the battle from
#[derive(Resource, Debug, Clone)]
pub struct BattleSetup {
    pub scenario: Scenario,
    pub config: GameConfig,
    /// Directory holding RON overrides for the embedded data
    pub data_dir: Option<PathBuf>,
}

impl Default for BattleSetup {
    fn default() -> Self {
        Self {
            scenario: sample_scenario(),
            config: GameConfig::default(),
            data_dir: None,
        }
    }
}

#[derive(Default)]
pub struct GamePlugin {
    pub setup: BattleSetup,
}

impl GamePlugin {
    pub fn new(setup: BattleSetup) -> Self {
        Self { setup }
    }
}

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.setup.clone())
            .add_plugins(TurnPlugin)
            .add_plugins(AiPlugin)
            .add_systems(OnEnter(GameState::Loading), start_battle)
            .add_systems(Update, present_effects.run_if(in_state(GameState::Battle)));
    }
}

fn start_battle(
    mut commands: Commands,
    setup: Res<BattleSetup>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let mut data = match GameData::load_defaults() {
        Ok(data) => data,
        Err(e) => {
            error!("Embedded game data is broken: {}", e);
            return;
        }
    };

    #[cfg(not(target_arch = "wasm32"))]
    if let Some(dir) = &setup.data_dir {
        let mut with_overrides = data.clone();
        match with_overrides.load_overrides(dir) {
            Ok(_) => data = with_overrides,
            Err(e) => warn!("Ignoring data overrides: {}", e),
        }
    }

    let delay = data.rules.cpu_step_delay_secs;
    match BattleState::new(&setup.scenario, data, setup.config.clone()) {
        Ok(battle) => {
            commands.insert_resource(battle);
            commands.insert_resource(AiState::with_delay(delay));
            next_state.set(GameState::Battle);
        }
        Err(e) => error!("Failed to start scenario '{}': {}", setup.scenario.id, e),
    }
}
