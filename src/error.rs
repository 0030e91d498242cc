//! Error Module
//!
//! Caller-visible failures of the batching engine. Side-effect failures
//! (notifications, shipping) never surface here; they are logged instead.

use crate::validation::ValidationError;
use thiserror::Error;

/// Failures of the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row could not be decoded into a domain value
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum BatchingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// The operation is illegal for the current status or `is_active` flag
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("product catalog error: {0}")]
    Catalog(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BatchingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BatchingError>;
