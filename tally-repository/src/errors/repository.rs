use thiserror::Error;

/// Errors raised by any storage adapter.
///
/// `Conflict` and `MissingReference` are the constraint violations the
/// engines translate into domain errors; everything else is transient.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Maps PostgreSQL constraint violations onto the typed variants.
    pub(crate) fn from_sqlx(err: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some("23505") => return Self::Conflict(context.to_string()),
                Some("23503") => return Self::MissingReference(context.to_string()),
                _ => {}
            }
        }
        Self::Database(err)
    }
}
