//! # AppError
//!
//! Centralized error handling for candi-tab.
//! Maps failures of the settings document and its sync to actionable types.

use thiserror::Error;

/// The primary error type for all ct-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Entity not found in the document (e.g., Block, Link)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty id)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Entity already exists (e.g., duplicate block id)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Local persistence failure (e.g., data directory not writable)
    #[error("storage error: {0}")]
    Storage(String),

    /// Remote document failure (e.g., network, bad credential)
    #[error("remote sync error: {0}")]
    Remote(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub(crate) fn block_not_found(id: &str) -> Self {
        AppError::NotFound("block".to_string(), id.to_string())
    }

    pub(crate) fn link_not_found(id: &str) -> Self {
        AppError::NotFound("link".to_string(), id.to_string())
    }
}

/// A specialized Result type for candi-tab logic.
pub type Result<T> = std::result::Result<T, AppError>;
