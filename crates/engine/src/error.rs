//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when a booking, filter or action breaks an invariant.
//! - [`Unauthorized`] thrown when the caller lacks the required access level.
//! - [`NotFound`] thrown when a realm, account, booking or matcher is missing.
//! - [`PreconditionFailed`] thrown when the state changed under the caller.
//! - [`Storage`] thrown when the datastore fails; the transaction is rolled back.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Unauthorized`]: EngineError::Unauthorized
//!  [`NotFound`]: EngineError::NotFound
//!  [`PreconditionFailed`]: EngineError::PreconditionFailed
//!  [`Storage`]: EngineError::Storage
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Storage(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::PreconditionFailed(a), Self::PreconditionFailed(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Validation(format!("malformed expression: {value}"))
    }
}
