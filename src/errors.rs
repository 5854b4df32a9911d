//! Engine error types
//!
//! Typed errors for misuse of the engine API.

use thiserror::Error;

/// Errors raised by the execution engine itself (as opposed to test
/// outcomes, which are carried by [`crate::model::TestResult`]).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl EngineError {
    /// Shorthand for an invalid-argument error
    pub fn argument(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument(message.into())
    }

    /// Shorthand for an invalid-operation error
    pub fn operation(message: impl Into<String>) -> Self {
        EngineError::InvalidOperation(message.into())
    }
}
