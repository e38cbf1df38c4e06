use thiserror::Error;

use crate::egress::EgressError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Egress error: {0}")]
    Egress(#[from] EgressError),

    #[error("Storage error: {0}")]
    Storage(#[from] opendal::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => Self::Conflict("Resource already exists".to_string()),
                    // PostgreSQL foreign_key_violation
                    "23503" => Self::NotFound("Referenced resource not found".to_string()),
                    // PostgreSQL check_violation
                    "23514" => Self::InvalidInput("Constraint check failed".to_string()),
                    _ => Self::Database(err),
                }
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
