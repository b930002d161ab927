use std::io;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

/// Crate-wide error type. Variants carry rendered messages rather than the
/// originating error values so results stay `Clone` and serializable across
/// service boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum CadastreError {
    #[error("Catalog store error: {0}")]
    Store(String),
    #[error("External catalog source error: {0}")]
    Source(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Reconciliation run cancelled")]
    Cancelled,
}

impl CadastreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CadastreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CadastreError::Source(_) => StatusCode::BAD_GATEWAY,
            CadastreError::Validation(_) => StatusCode::BAD_REQUEST,
            CadastreError::NotFound(_) => StatusCode::NOT_FOUND,
            CadastreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CadastreError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CadastreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CadastreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<sqlx::Error> for CadastreError {
    fn from(src: sqlx::Error) -> CadastreError {
        match src {
            sqlx::Error::RowNotFound => CadastreError::NotFound("database row not found".into()),
            other => CadastreError::Store(format!("{other}")),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CadastreError {
    fn from(src: sqlx::migrate::MigrateError) -> CadastreError {
        CadastreError::Store(format!("migration failed: {src}"))
    }
}

impl From<reqwest::Error> for CadastreError {
    fn from(src: reqwest::Error) -> CadastreError {
        CadastreError::Source(format!("{src}"))
    }
}

impl From<JsonError> for CadastreError {
    fn from(src: JsonError) -> CadastreError {
        CadastreError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for CadastreError {
    fn from(src: toml::de::Error) -> CadastreError {
        CadastreError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<uuid::Error> for CadastreError {
    fn from(src: uuid::Error) -> CadastreError {
        CadastreError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for CadastreError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CadastreError::NotFound(format!("{x}")),
            _ => CadastreError::Io(format!("IOError: {}", x.kind())),
        }
    }
}
