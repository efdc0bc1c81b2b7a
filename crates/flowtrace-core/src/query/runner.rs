//! Single-query runner
//!
//! A submitted query is a small state machine over [`QueryStatus`]:
//!
//! ```text
//! Scheduled ─► Running ─► Complete
//!     │           │
//!     └───────────┴─────► Failed | Cancelled | Timeout | Unknown
//! ```
//!
//! [`AsyncQuery::advance`] is the only transition function. The runner feeds
//! it one poll snapshot at a time and sleeps a fixed interval between polls.

use super::QueryError;
use crate::backend::LogQueryBackend;
use crate::config::PollPolicy;
use crate::model::{AsyncQuery, QueryStatus, ResultRow};
use std::sync::Arc;
use tokio::time::sleep;

/// What the poll loop should do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Still `Scheduled` or `Running`; poll again after the delay
    Wait,
    /// Reached `Complete`; rows are available
    Complete,
    /// Reached another terminal status
    Terminal(QueryStatus),
}

impl AsyncQuery {
    /// Apply one poll snapshot.
    ///
    /// Once the query is terminal further snapshots are ignored and the
    /// terminal step is repeated.
    pub fn advance(&mut self, snapshot: AsyncQuery) -> PollStep {
        if !self.status.is_terminal() {
            self.status = snapshot.status;
            if self.status == QueryStatus::Complete {
                self.rows = snapshot.rows;
            }
        }

        match self.status {
            QueryStatus::Scheduled | QueryStatus::Running => PollStep::Wait,
            QueryStatus::Complete => PollStep::Complete,
            other => PollStep::Terminal(other),
        }
    }
}

/// Runs one query to completion against a [`LogQueryBackend`].
#[derive(Clone)]
pub struct AsyncQueryRunner {
    backend: Arc<dyn LogQueryBackend>,
    policy: PollPolicy,
}

impl AsyncQueryRunner {
    /// Create a runner with the default poll policy
    pub fn new(backend: Arc<dyn LogQueryBackend>) -> Self {
        Self {
            backend,
            policy: PollPolicy::default(),
        }
    }

    /// Set the poll policy
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Submit a query; returns its id
    pub async fn submit(
        &self,
        partition: &str,
        query: &str,
        start_epoch: i64,
        end_epoch: i64,
    ) -> Result<String, QueryError> {
        self.backend
            .submit_query(partition, query, start_epoch, end_epoch)
            .await
            .map_err(|source| QueryError::Submit {
                partition: partition.to_string(),
                source,
            })
    }

    /// Fetch one snapshot of a submitted query
    pub async fn poll(&self, query_id: &str) -> Result<AsyncQuery, QueryError> {
        let results = self
            .backend
            .get_query_results(query_id)
            .await
            .map_err(|source| QueryError::Poll {
                query_id: query_id.to_string(),
                source,
            })?;

        Ok(AsyncQuery::from_results(query_id, results))
    }

    /// Submit, then poll until terminal.
    ///
    /// Returns the rows on `Complete`, `QueryNotComplete(status)` on any other
    /// terminal status. The submission is never retried.
    pub async fn run(
        &self,
        partition: &str,
        query: &str,
        start_epoch: i64,
        end_epoch: i64,
    ) -> Result<Vec<ResultRow>, QueryError> {
        let query_id = self.submit(partition, query, start_epoch, end_epoch).await?;
        tracing::debug!(partition = partition, query_id = %query_id, "Submitted log query");

        let mut state = AsyncQuery::submitted(query_id);
        let mut polls: u32 = 0;

        loop {
            let snapshot = self.poll(&state.id).await?;
            polls += 1;

            match state.advance(snapshot) {
                PollStep::Complete => {
                    tracing::debug!(
                        query_id = %state.id,
                        polls = polls,
                        rows = state.rows.len(),
                        "Log query complete"
                    );
                    return Ok(state.rows);
                }
                PollStep::Terminal(status) => {
                    tracing::debug!(query_id = %state.id, status = %status, "Log query ended");
                    return Err(QueryError::QueryNotComplete(status));
                }
                PollStep::Wait => {
                    if let Some(max) = self.policy.max_polls {
                        if polls >= max {
                            return Err(QueryError::PollBudgetExhausted {
                                query_id: state.id,
                                polls,
                            });
                        }
                    }
                    tracing::debug!(query_id = %state.id, status = %state.status, "Log query pending");
                    sleep(self.policy.interval()).await;
                }
            }
        }
    }
}
