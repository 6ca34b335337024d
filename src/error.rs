//! Error types for memex
//!
//! This module defines the error taxonomy shared by every storage backend,
//! the window algorithms and the history manager, using `thiserror` for
//! ergonomic error handling.

use thiserror::Error;

/// Main error type for memex operations
///
/// Backends distinguish caller mistakes (`Validation`) from engine failures
/// (`Database`, `Connection`) and constraint violations (`Integrity`) so that
/// callers can decide whether retrying makes sense.
#[derive(Error, Debug)]
pub enum MemexError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied argument violates a precondition
    #[error("Validation error: {0}")]
    Validation(String),

    /// An operation required a thread that does not exist
    #[error("Thread not found: {0}")]
    NotFound(String),

    /// The database engine failed while executing an operation
    #[error("Database error while {action}: {source}")]
    Database {
        /// What was being attempted
        action: String,
        /// Underlying engine error
        #[source]
        source: rusqlite::Error,
    },

    /// A write violated a database constraint
    #[error("Database integrity error while {action}: {source}")]
    Integrity {
        /// What was being attempted
        action: String,
        /// Underlying constraint violation
        #[source]
        source: rusqlite::Error,
    },

    /// The database could not be opened or initialized
    #[error("Failed to {action}: {source}")]
    Connection {
        /// What was being attempted
        action: String,
        /// Underlying engine error
        #[source]
        source: rusqlite::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`MemexError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration
    Config,
    /// Bad input, raised before any side effect
    Validation,
    /// Required thread is missing
    NotFound,
    /// Backend operation failure
    Database,
    /// Constraint violation on write
    Integrity,
    /// Backend unreachable
    Connection,
    /// Anything else (IO, serde)
    Other,
}

impl MemexError {
    /// Build a validation error from any displayable message
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify a database failure, separating constraint violations
    /// from generic engine errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use memex::error::{ErrorKind, MemexError};
    ///
    /// let err = MemexError::from_sqlite("saving thread", rusqlite::Error::InvalidQuery);
    /// assert_eq!(err.kind(), ErrorKind::Database);
    /// assert!(err.to_string().starts_with("Database error while saving thread"));
    /// ```
    pub fn from_sqlite(action: impl Into<String>, source: rusqlite::Error) -> Self {
        let action = action.into();
        match &source {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Integrity { action, source }
            }
            _ => Self::Database { action, source },
        }
    }

    /// Wrap a failure to open or initialize the database
    pub fn connection(action: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Connection {
            action: action.into(),
            source,
        }
    }

    /// Returns the coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database { .. } => ErrorKind::Database,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Io(_) => ErrorKind::Other,
        }
    }
}

/// Classify an error produced anywhere in the crate
///
/// Returns `None` when the error did not originate from a [`MemexError`].
pub fn kind_of(error: &anyhow::Error) -> Option<ErrorKind> {
    error.downcast_ref::<MemexError>().map(MemexError::kind)
}

/// Result type alias for memex operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Use
/// [`kind_of`] to recover the [`MemexError`] classification.
pub type Result<T> = anyhow::Result<T>;
