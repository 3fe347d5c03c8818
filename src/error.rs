//! Error types for engine session operations.

use std::fmt;

/// Error returned by [`EngineSession`](crate::engine::EngineSession) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No worker reached readiness, or the worker went away
    Unavailable { reason: String },
    /// The worker answered a search with a line that holds no valid move
    Protocol { line: String },
    /// Another operation of the same kind is already in flight
    Busy { operation: &'static str },
    /// The worker did not finish a search in time
    SearchTimeout { after_ms: u64 },
    /// The caller's position names no board to search
    InvalidPosition { position: String },
}

impl EngineError {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        EngineError::Unavailable {
            reason: reason.into(),
        }
    }

    pub(crate) fn protocol(line: &str) -> Self {
        EngineError::Protocol {
            line: line.trim().to_string(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Unavailable { reason } => {
                write!(f, "Engine unavailable: {reason}")
            }
            EngineError::Protocol { line } => {
                write!(f, "Could not parse engine reply '{line}'")
            }
            EngineError::Busy { operation } => {
                write!(f, "A {operation} is already in flight on this session")
            }
            EngineError::SearchTimeout { after_ms } => {
                write!(f, "Engine did not answer the search within {after_ms}ms")
            }
            EngineError::InvalidPosition { position } => {
                write!(f, "No position to search in '{position}'")
            }
        }
    }
}

impl std::error::Error for EngineError {}
