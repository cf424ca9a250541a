mod config;
mod controller;
mod state;

pub use config::ArenaRules;
pub use controller::{PlayerController, Shot};
pub use state::PlayerState;
