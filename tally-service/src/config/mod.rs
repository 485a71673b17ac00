//! Configuration module for the tally service.
//! Reads settings from the environment and wires the dependencies.
mod dependencies;
mod settings;

pub use dependencies::{Dependencies, reconnect_cache};
pub use settings::Settings;
