use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::time::TimeUpdateStrategy;
use std::path::{Path, PathBuf};
use std::time::Duration;

use castle_tactics::game::{sample_scenario, BattleSetup, BattleState, GameConfig, GamePlugin, Scenario};
use castle_tactics::states::GameState;

/// Stop a stalemate after this many rounds
const MAX_ROUNDS: u32 = 100;
/// Simulated time per frame
const FRAME: Duration = Duration::from_millis(250);
const MAX_FRAMES: u32 = 500_000;

fn main() {
    let scenario = match std::env::args().nth(1) {
        Some(path) => match Scenario::load(Path::new(&path)) {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("Failed to load scenario {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => sample_scenario(),
    };

    let mut app = App::new();
    app.add_plugins((MinimalPlugins, LogPlugin::default(), StatesPlugin))
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME))
        .init_state::<GameState>()
        .add_plugins(GamePlugin::new(BattleSetup {
            scenario,
            config: GameConfig::all_cpu(),
            data_dir: Some(PathBuf::from("mods")),
        }));
    app.finish();
    app.cleanup();

    for _ in 0..MAX_FRAMES {
        app.update();
        let world = app.world();
        if *world.resource::<State<GameState>>().get() == GameState::GameOver {
            break;
        }
        if world
            .get_resource::<BattleState>()
            .is_some_and(|battle| battle.turn.round_count > MAX_ROUNDS)
        {
            info!("Round limit of {} reached", MAX_ROUNDS);
            break;
        }
    }

    let Some(battle) = app.world().get_resource::<BattleState>() else {
        error!("Battle never started");
        std::process::exit(1);
    };
    for faction in battle.faction_order() {
        let units = battle.units.iter().filter(|u| u.faction == faction).count();
        info!(
            "{}: {} units, budget {}",
            battle.faction_name(faction),
            units,
            battle.budget(faction)
        );
    }
    match battle.winner() {
        Some(winner) => info!("Winner: {}", battle.faction_name(winner)),
        None => info!("No winner after {} rounds", battle.turn.round_count),
    }
}
