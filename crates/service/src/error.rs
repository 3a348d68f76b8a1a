//! Caller-facing error taxonomy for the orchestration layer.

use thiserror::Error;

use taskboard_core::DomainError;
use taskboard_store::StoreError;

/// Error surfaced to API callers.
///
/// The variants map directly onto response classes: `Validation` to bad
/// request, `NotFound` to not found, `Conflict` to conflict, `Store` to an
/// internal failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Store(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::NotFound(entity) => ServiceError::NotFound(entity),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => ServiceError::NotFound(entity),
            StoreError::Constraint(msg) => ServiceError::Conflict(msg),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}
