//! External boundaries consumed by the engine
//!
//! The engine never talks to a log service, a flow-definition store or a
//! trace service directly. Each is reached through one of the traits below,
//! and callers hand concrete implementations to every operation.
//!
//! # Async Design
//!
//! All methods are async so remote implementations can suspend on I/O.
//! In-memory implementations can simply return immediately.

use crate::model::QueryResults;
use crate::trace::TraceBatch;
use thiserror::Error;

/// Errors reported by a backend implementation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// The remote side answered with a non-success status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend is not configured or not reachable
    #[error("Backend not available: {0}")]
    Unavailable(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Asynchronous log-query service (a Logs-Insights style API).
#[async_trait::async_trait]
pub trait LogQueryBackend: Send + Sync {
    /// Start a query over one log partition; returns the query id
    ///
    /// # Arguments
    ///
    /// * `partition` - Log partition (log group) name
    /// * `query` - Query string in the service's query language
    /// * `start_epoch` / `end_epoch` - Window in epoch seconds
    async fn submit_query(
        &self,
        partition: &str,
        query: &str,
        start_epoch: i64,
        end_epoch: i64,
    ) -> BackendResult<String>;

    /// Fetch the current status and, once complete, the result rows
    async fn get_query_results(&self, query_id: &str) -> BackendResult<QueryResults>;
}

/// Source of authored flow definitions.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FlowDefinitionSource: Send + Sync {
    /// Look up the authored expression behind one operand of a comparison
    /// block. `Ok(None)` means the block exists but carries no such value.
    async fn get_comparison_value(
        &self,
        flow_id: &str,
        identifier: &str,
        field: &str,
        is_second_operand: bool,
    ) -> BackendResult<Option<String>>;
}

/// Distributed-trace service.
#[async_trait::async_trait]
pub trait TraceSource: Send + Sync {
    async fn batch_get_traces(&self, trace_ids: &[String]) -> BackendResult<TraceBatch>;
}
