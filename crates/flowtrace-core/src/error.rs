//! Error types for the trace engine
//!
//! Each stage owns a narrow error enum; [`FlowTraceError`] aggregates them
//! for operations that span several stages.

use crate::backend::BackendError;
use crate::layout::LayoutError;
use crate::query::QueryError;
use crate::trace::TraceError;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum FlowTraceError {
    /// A log query did not complete
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// An external boundary failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Graph layout rejected its configuration
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// A trace document could not be used
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    /// Invalid request data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FlowTraceError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        FlowTraceError::InvalidInput(msg.into())
    }

    /// Check if this error was caused by the caller's input (vs upstream)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            FlowTraceError::InvalidInput(_) | FlowTraceError::Layout(_)
        )
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FlowTraceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueryStatus;

    #[test]
    fn test_error_display() {
        let err = FlowTraceError::invalid_input("contact id is empty");
        assert_eq!(err.to_string(), "Invalid input: contact id is empty");

        let err: FlowTraceError = QueryError::QueryNotComplete(QueryStatus::Timeout).into();
        assert_eq!(err.to_string(), "Query error: Query did not complete: Timeout");
    }

    #[test]
    fn test_is_user_error() {
        assert!(FlowTraceError::invalid_input("x").is_user_error());
        assert!(FlowTraceError::Layout(LayoutError::InvalidColumns(0)).is_user_error());
        assert!(!FlowTraceError::Backend(BackendError::Network("down".into())).is_user_error());
    }
}
