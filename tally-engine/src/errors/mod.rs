//! Error types for the tally engines.
mod engine;

pub use engine::EngineError;
