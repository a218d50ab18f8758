use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Faction identifiers. A scenario picks which of them take part and in
/// what turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactionId {
    Red,
    Blue,
    Yellow,
    Green,
}

impl FactionId {
    pub fn all() -> &'static [FactionId] {
        &[FactionId::Red, FactionId::Blue, FactionId::Yellow, FactionId::Green]
    }
}

/// A faction taking part in the battle. Fixed for the whole game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    /// RGB color values (0.0-1.0)
    pub color: [f32; 3],
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>, color: [f32; 3]) -> Self {
        Self { id, name: name.into(), color }
    }

    pub fn color(&self) -> Color {
        Color::srgb(self.color[0], self.color[1], self.color[2])
    }
}

/// Who issues the intents for a faction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerType {
    #[default]
    Human,
    Cpu,
}

/// Per-faction controller assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub controllers: Vec<(FactionId, ControllerType)>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            controllers: vec![
                (FactionId::Blue, ControllerType::Human),
                (FactionId::Red, ControllerType::Cpu),
                (FactionId::Yellow, ControllerType::Cpu),
                (FactionId::Green, ControllerType::Cpu),
            ],
        }
    }
}

impl GameConfig {
    /// Every faction driven by the AI
    pub fn all_cpu() -> Self {
        Self {
            controllers: FactionId::all()
                .iter()
                .map(|&id| (id, ControllerType::Cpu))
                .collect(),
        }
    }

    /// Unlisted factions default to human control
    pub fn controller(&self, faction: FactionId) -> ControllerType {
        self.controllers
            .iter()
            .find(|(id, _)| *id == faction)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }

    pub fn set_controller(&mut self, faction: FactionId, controller: ControllerType) {
        match self.controllers.iter_mut().find(|(id, _)| *id == faction) {
            Some(entry) => entry.1 = controller,
            None => self.controllers.push((faction, controller)),
        }
    }
}
