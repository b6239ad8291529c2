//! Game simulation modules

pub mod combat;
pub mod grid;
pub mod r#match;
pub mod movement;
pub mod player;
pub mod snapshot;
pub mod world;

pub use r#match::{GameMatch, MatchHandle};
pub use world::{Rules, World};
