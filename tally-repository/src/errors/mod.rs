//! Error types for the tally repository.
mod repository;

pub use repository::RepositoryError;
