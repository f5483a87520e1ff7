//! Errors raised by the picking domain itself.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rejection of a picking command or a malformed domain value.
///
/// Record-store and transport failures live in `pickflow-infra`; nothing here
/// carries IO state, so errors compare and clone freely in tests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input the workflow cannot act on: no batch loaded, negative quantity,
    /// unparseable date.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Zone, location or operation absent from the loaded batch.
    #[error("not found: {0}")]
    NotFound(String),

    /// The session is waiting on a confirmation, or the command does not fit
    /// the current phase.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
