//! Concurrent multi-branch queries
//!
//! One query per branch (log partition or month bucket) runs concurrently on
//! the current task. A failing branch contributes no rows; it never aborts
//! the others. Fan-out width is not capped.

use super::months::month_windows;
use super::runner::AsyncQueryRunner;
use crate::model::{row_value, ResultRow};
use chrono::NaiveDate;
use std::collections::HashSet;

/// One query target: a partition and a time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBranch {
    /// Name used in logs (partition name or month key)
    pub label: String,
    pub partition: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
}

impl QueryBranch {
    pub fn new(partition: impl Into<String>, start_epoch: i64, end_epoch: i64) -> Self {
        let partition = partition.into();
        Self {
            label: partition.clone(),
            partition,
            start_epoch,
            end_epoch,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Keep the first row seen for each value of `field`.
///
/// Rows without the field are always kept.
pub fn dedup_rows(rows: Vec<ResultRow>, field: &str) -> Vec<ResultRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| match row_value(row, field) {
            Some(key) => seen.insert(key.to_string()),
            None => true,
        })
        .collect()
}

/// Issues one [`AsyncQueryRunner::run`] per branch and merges the rows.
#[derive(Clone)]
pub struct FanOutAggregator {
    runner: AsyncQueryRunner,
    dedup_field: Option<String>,
}

impl FanOutAggregator {
    /// Create an aggregator without deduplication
    pub fn new(runner: AsyncQueryRunner) -> Self {
        Self {
            runner,
            dedup_field: None,
        }
    }

    /// Deduplicate merged rows by this field
    pub fn with_dedup_field(mut self, field: Option<String>) -> Self {
        self.dedup_field = field;
        self
    }

    /// Run `query` on every branch concurrently.
    ///
    /// Rows are concatenated in branch order, then deduplicated.
    pub async fn run_branches(&self, query: &str, branches: &[QueryBranch]) -> Vec<ResultRow> {
        let futures: Vec<_> = branches
            .iter()
            .map(|branch| async move {
                match self
                    .runner
                    .run(&branch.partition, query, branch.start_epoch, branch.end_epoch)
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!(
                            branch = %branch.label,
                            partition = %branch.partition,
                            error = %e,
                            "Query branch failed, continuing without its rows"
                        );
                        Vec::new()
                    }
                }
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;
        let merged: Vec<ResultRow> = outcomes.into_iter().flatten().collect();

        match &self.dedup_field {
            Some(field) => dedup_rows(merged, field),
            None => merged,
        }
    }

    /// Run `query` over several partitions with the same window
    pub async fn run_partitions(
        &self,
        partitions: &[String],
        query: &str,
        start_epoch: i64,
        end_epoch: i64,
    ) -> Vec<ResultRow> {
        let branches: Vec<QueryBranch> = partitions
            .iter()
            .map(|p| QueryBranch::new(p.clone(), start_epoch, end_epoch))
            .collect();
        self.run_branches(query, &branches).await
    }

    /// Run `query` over one partition, one branch per calendar month in
    /// `[start_date, end_date]`
    pub async fn run_months(
        &self,
        partition: &str,
        query: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Vec<ResultRow> {
        let branches: Vec<QueryBranch> = month_windows(start_date, end_date)
            .into_iter()
            .map(|w| QueryBranch::new(partition, w.start_epoch, w.end_epoch).with_label(w.key))
            .collect();
        self.run_branches(query, &branches).await
    }
}
