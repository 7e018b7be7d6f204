//! Engine error types

use crate::validation::ValidationReport;
use thiserror::Error;

/// Errors produced by the mutation surface of the engine.
///
/// Read paths (`evaluate`, `is_enabled`, `get_value`) never return these;
/// they degrade to the flag's default value instead.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Flag failed structural validation
    #[error("flag validation failed: {0}")]
    Validation(ValidationReport),

    /// No flag registered under the given key
    #[error("flag not found: {0}")]
    NotFound(String),

    /// A flag with the same key already exists
    #[error("flag already registered: {0}")]
    AlreadyRegistered(String),

    /// Configuration document could not be imported
    #[error("import failed: {0}")]
    Import(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persistence adapter error
    #[error("store error: {0}")]
    Store(String),
}

impl From<serde_json::Error> for FlagError {
    fn from(err: serde_json::Error) -> Self {
        FlagError::Serialization(err.to_string())
    }
}
