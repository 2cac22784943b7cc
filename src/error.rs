use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("failed to hash password: {0}")]
    Hashing(String),
}
