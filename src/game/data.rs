//! Game data for Castle Tactics
//!
//! Rules, the unit catalog and the spell book are RON documents embedded at
//! compile time. Native builds can override any of them from a directory
//! holding files with the same names.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::{SpellBook, UnitCatalog, UnitType};

const DEFAULT_UNITS_RON: &str = include_str!("../../assets/data/units.ron");
const DEFAULT_RULES_RON: &str = include_str!("../../assets/data/rules.ron");
const DEFAULT_SPELLS_RON: &str = include_str!("../../assets/data/spells.ron");

#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog has no entry for hireable unit {0:?}")]
    MissingCatalogEntry(UnitType),

    #[error("experience table must list one threshold per level, got {0}")]
    BadThresholds(usize),
}

/// Experience scaling for a (winner, defeated) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affinity {
    pub winner: UnitType,
    pub loser: UnitType,
    pub multiplier: f32,
}

/// Tunable rule constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Income every faction receives at turn start
    pub base_income: u32,
    pub income_per_town: u32,
    pub income_per_castle: u32,
    /// Budget spent per restored hit point when supplying
    pub cost_hp_per_point: u32,
    /// Budget spent per restored food point when supplying
    pub cost_food_per_point: u32,
    /// Attack gained per level
    pub level_bonus_attack: i32,
    /// Defense gained per level (0 disables the defender level bonus)
    pub level_bonus_defense: i32,
    pub base_exp_per_kill: u32,
    /// `exp_thresholds[level - 1]` experience leaves `level`; the last entry crowns
    pub exp_thresholds: Vec<u32>,
    #[serde(default)]
    pub affinities: Vec<Affinity>,
    /// Whether hiring marks the King as having acted
    pub hire_consumes_action: bool,
    /// Hires a CPU faction may make per turn
    pub cpu_hires_per_turn: u32,
    /// Seconds between AI steps
    pub cpu_step_delay_secs: f32,
}

impl RulesConfig {
    pub fn affinity(&self, winner: UnitType, loser: UnitType) -> f32 {
        self.affinities
            .iter()
            .find(|a| a.winner == winner && a.loser == loser)
            .map(|a| a.multiplier)
            .unwrap_or(1.0)
    }

    /// Experience for a kill, scaled by affinity
    pub fn kill_experience(&self, winner: UnitType, loser: UnitType) -> u32 {
        (self.base_exp_per_kill as f32 * self.affinity(winner, loser)).round() as u32
    }
}

/// Everything the rules engine reads but never writes
#[derive(Debug, Clone, PartialEq)]
pub struct GameData {
    pub catalog: UnitCatalog,
    pub rules: RulesConfig,
    pub spells: SpellBook,
}

impl GameData {
    /// Parse the embedded defaults
    pub fn load_defaults() -> Result<Self, DataError> {
        let data = Self {
            catalog: parse("units.ron", DEFAULT_UNITS_RON)?,
            rules: parse("rules.ron", DEFAULT_RULES_RON)?,
            spells: parse("spells.ron", DEFAULT_SPELLS_RON)?,
        };
        data.validate()?;
        Ok(data)
    }

    /// Replace any document that exists in `dir`. Returns the files applied.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_overrides(&mut self, dir: &Path) -> Result<Vec<String>, DataError> {
        let mut applied = Vec::new();
        if !dir.exists() {
            info!("No data override directory at {}, using defaults", dir.display());
            return Ok(applied);
        }

        if let Some(content) = read_optional(&dir.join("units.ron"))? {
            self.catalog = parse("units.ron", &content)?;
            applied.push("units.ron".to_string());
        }
        if let Some(content) = read_optional(&dir.join("rules.ron"))? {
            self.rules = parse("rules.ron", &content)?;
            applied.push("rules.ron".to_string());
        }
        if let Some(content) = read_optional(&dir.join("spells.ron"))? {
            self.spells = parse("spells.ron", &content)?;
            applied.push("spells.ron".to_string());
        }

        self.validate()?;
        for file in &applied {
            info!("Loaded data override: {}", file);
        }
        Ok(applied)
    }

    fn validate(&self) -> Result<(), DataError> {
        for &unit_type in &self.catalog.hireable {
            if self.catalog.get(unit_type).is_none() {
                return Err(DataError::MissingCatalogEntry(unit_type));
            }
        }
        let levels = super::MAX_LEVEL as usize;
        if self.rules.exp_thresholds.len() != levels {
            return Err(DataError::BadThresholds(self.rules.exp_thresholds.len()));
        }
        Ok(())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(file: &str, content: &str) -> Result<T, DataError> {
    ron::from_str(content).map_err(|source| DataError::Parse {
        file: file.to_string(),
        source,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, DataError> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .map_err(|source| DataError::Io {
            file: path.display().to_string(),
            source,
        })
}
