//! Asynchronous log queries
//!
//! - `runner` - submit one query and poll it to a terminal status
//! - `fanout` - run many queries concurrently and merge their rows
//! - `months` - calendar-month buckets for date-range searches

mod fanout;
mod months;
mod runner;

pub use fanout::{dedup_rows, FanOutAggregator, QueryBranch};
pub use months::{month_buckets, month_key, month_windows, MonthWindow};
pub use runner::{AsyncQueryRunner, PollStep};

use crate::backend::BackendError;
use crate::model::QueryStatus;
use thiserror::Error;

/// Errors from running a single query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The submission itself was rejected
    #[error("Failed to submit query to {partition}: {source}")]
    Submit {
        partition: String,
        #[source]
        source: BackendError,
    },

    /// A poll round-trip failed
    #[error("Failed to poll query {query_id}: {source}")]
    Poll {
        query_id: String,
        #[source]
        source: BackendError,
    },

    /// The query reached a terminal status other than `Complete`
    #[error("Query did not complete: {0}")]
    QueryNotComplete(QueryStatus),

    /// The configured poll budget ran out while the query was still running
    #[error("Query {query_id} still running after {polls} polls")]
    PollBudgetExhausted { query_id: String, polls: u32 },
}

/// Build the flow-log query for one contact.
pub fn contact_flow_query(contact_id: &str) -> String {
    let escaped = contact_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "fields @timestamp, @message | filter ContactId = \"{}\" | sort @timestamp asc | limit 10000",
        escaped
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_flow_query() {
        let query = contact_flow_query("abc-123");
        assert!(query.contains("filter ContactId = \"abc-123\""));
        assert!(query.starts_with("fields @timestamp, @message"));
    }

    #[test]
    fn test_contact_flow_query_escapes_quotes() {
        let query = contact_flow_query("a\"b");
        assert!(query.contains("\"a\\\"b\""));
    }
}
