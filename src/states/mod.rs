use bevy::prelude::*;

/// Main game states
#[derive(States, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GameState {
    /// Parsing data and building the battle
    #[default]
    Loading,
    Battle,
    GameOver,
}
