//! Store operation errors and sqlx error mapping.

use thiserror::Error;

/// Persistence-layer error.
///
/// These are **infrastructure errors** (missing rows, constraint violations,
/// backend failures) as opposed to domain errors (validation). The service
/// layer maps them onto the caller-facing taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed or referenced entity does not exist.
    /// The payload names the entity kind ("task", "project", ...).
    #[error("{0} not found")]
    NotFound(String),

    /// A storage constraint was violated inside a transaction
    /// (foreign key, unique, or check constraint).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The storage backend failed (connection, serialization, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Map a sqlx error onto [`StoreError`].
///
/// Error codes: `23503` foreign key, `23505` unique, `23514` check — all are
/// constraint violations that must roll back the surrounding transaction.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23503") | Some("23505") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            // Queries here use fetch_optional/fetch_all; reaching this is a bug.
            StoreError::Backend(format!("unexpected row not found in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
