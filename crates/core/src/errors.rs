//! Core error types for the ecomap engine.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) and transport errors from the LCI data crate are
//! converted to these types at the crate boundary.

use std::num::ParseFloatError;
use thiserror::Error;

use crate::circularity::CircularityError;
use crate::mapping::MappingError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Circularity calculation failed: {0}")]
    Circularity(#[from] CircularityError),

    #[error("External data source failed: {0}")]
    External(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// How a caller should surface an [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusKind {
    /// Unknown product, BOM line, scenario or rule. Never retried.
    NotFound,
    /// Data exists but is not in a state the operation can use
    /// (missing circularity parameters, unconfirmed mapping). Needs human review.
    PreconditionFailed,
    /// Malformed input.
    Invalid,
    /// Anything else.
    Internal,
}

impl Error {
    /// Classifies the error for the calling layer.
    pub fn status_kind(&self) -> StatusKind {
        match self {
            Error::NotFound(_) | Error::Database(DatabaseError::NotFound(_)) => StatusKind::NotFound,
            Error::Mapping(MappingError::UnconfirmedMapping { .. })
            | Error::Circularity(CircularityError::MissingMaterialParameters { .. }) => {
                StatusKind::PreconditionFailed
            }
            Error::Validation(_)
            | Error::InvalidConfigValue(_)
            | Error::Mapping(MappingError::InvalidSettings(_))
            | Error::Circularity(CircularityError::InvalidScenario(_)) => StatusKind::Invalid,
            _ => StatusKind::Internal,
        }
    }
}

/// Database-agnostic error type for storage operations.
///
/// Uses `String` for all error details so the storage layer can convert
/// Diesel/SQLite errors into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Failed to parse number: {0}")]
    NumberParse(#[from] ParseFloatError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Malformed CSV: {0}")]
    Csv(String),

    #[error("Malformed JSON: {0}")]
    Json(String),
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Validation(ValidationError::Csv(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::Json(err.to_string()))
    }
}
