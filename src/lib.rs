//! Orbital Duel - simulation and turn orchestration core
//!
//! Two ships trade projectiles through a field of massive bodies. The crate
//! covers the deterministic flight physics, damage resolution and the
//! turn/round/match state machine. Rendering, audio, camera framing and
//! networking are collaborators behind the traits in `game::events`.

pub mod config;
pub mod game;
pub mod util;
