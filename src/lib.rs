//! Castle Tactics: rules engine for a grid-based, multi-faction
//! turn-based tactics game, packaged as Bevy plugins.

pub mod game;
pub mod states;
