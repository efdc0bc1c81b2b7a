//! Contact tracing pipeline
//!
//! [`ContactTracer`] wires the stages together for one contact:
//! fan-out query, normalize, sort, enrich, reduce, layout. Trace ids found in
//! the entries are analysed when a [`TraceSource`] is attached.

use crate::backend::{BackendError, FlowDefinitionSource, LogQueryBackend, TraceSource};
use crate::config::TracerConfig;
use crate::enrich::AttributeEnricher;
use crate::error::{FlowTraceError, Result};
use crate::layout::{layout, ExecutionGraph, LayoutConfig};
use crate::model::{LogEntry, ResultRow};
use crate::normalize::{discover_trace_ids, normalize_rows, sort_chronologically};
use crate::query::{contact_flow_query, AsyncQueryRunner, FanOutAggregator};
use crate::reduce::reduce;
use crate::trace::{parse_batch, TraceAnalysis};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Request to reconstruct one contact's execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactTraceRequest {
    pub contact_id: String,
    /// Window start, epoch seconds
    pub start_epoch: i64,
    /// Window end, epoch seconds
    pub end_epoch: i64,
    /// Partitions to search instead of the configured ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_groups: Option<Vec<String>>,
}

impl ContactTraceRequest {
    pub fn new(contact_id: impl Into<String>, start_epoch: i64, end_epoch: i64) -> Self {
        Self {
            contact_id: contact_id.into(),
            start_epoch,
            end_epoch,
            log_groups: None,
        }
    }

    pub fn with_log_groups(mut self, groups: Vec<String>) -> Self {
        self.log_groups = Some(groups);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.contact_id.trim().is_empty() {
            return Err(FlowTraceError::invalid_input("contact id is empty"));
        }
        if self.start_epoch > self.end_epoch {
            return Err(FlowTraceError::invalid_input(format!(
                "window start {} is after end {}",
                self.start_epoch, self.end_epoch
            )));
        }
        Ok(())
    }
}

/// Reconstructed execution of one contact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactTrace {
    pub contact_id: String,
    pub graph: ExecutionGraph,
    /// Distributed-trace ids referenced by the entries, first-seen order
    pub trace_ids: Vec<String>,
    /// Analyses of `trace_ids`; empty without a trace source
    pub traces: Vec<TraceAnalysis>,
    /// Entries before reduction
    pub entry_count: usize,
}

/// Sort, reduce and lay out already-normalized entries
pub fn build_graph(mut entries: Vec<LogEntry>, config: &LayoutConfig) -> Result<ExecutionGraph> {
    sort_chronologically(&mut entries);
    let nodes = reduce(entries);
    Ok(layout(nodes, config)?)
}

/// Runs the pipeline against caller-provided backends.
#[derive(Clone)]
pub struct ContactTracer {
    config: TracerConfig,
    logs: Arc<dyn LogQueryBackend>,
    flows: Option<Arc<dyn FlowDefinitionSource>>,
    traces: Option<Arc<dyn TraceSource>>,
}

impl ContactTracer {
    pub fn new(config: TracerConfig, logs: Arc<dyn LogQueryBackend>) -> Self {
        Self {
            config,
            logs,
            flows: None,
            traces: None,
        }
    }

    /// Attach a flow-definition source used for comparison enrichment
    pub fn with_flow_source(mut self, flows: Arc<dyn FlowDefinitionSource>) -> Self {
        self.flows = Some(flows);
        self
    }

    /// Attach a distributed-trace source
    pub fn with_trace_source(mut self, traces: Arc<dyn TraceSource>) -> Self {
        self.traces = Some(traces);
        self
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    fn runner(&self) -> AsyncQueryRunner {
        AsyncQueryRunner::new(self.logs.clone()).with_policy(self.config.poll.clone())
    }

    /// Reconstruct the execution graph of one contact
    pub async fn trace_contact(&self, request: &ContactTraceRequest) -> Result<ContactTrace> {
        request.validate()?;
        let started = Instant::now();

        let groups = request.log_groups.as_ref().unwrap_or(&self.config.log_groups);
        if groups.is_empty() {
            return Err(FlowTraceError::invalid_input("no log groups to search"));
        }

        tracing::info!(
            contact_id = %request.contact_id,
            log_groups = groups.len(),
            "Tracing contact"
        );

        // Flow logs are never deduplicated; every row is one execution
        let fanout = FanOutAggregator::new(self.runner());
        let rows = fanout
            .run_partitions(
                groups,
                &contact_flow_query(&request.contact_id),
                request.start_epoch,
                request.end_epoch,
            )
            .await;

        let mut entries = normalize_rows(&rows);
        sort_chronologically(&mut entries);
        let entry_count = entries.len();

        let entries = match (&self.flows, self.config.enrich) {
            (Some(flows), true) => AttributeEnricher::new(flows.clone()).enrich_all(entries).await,
            _ => entries,
        };

        let trace_ids = discover_trace_ids(&entries);
        let nodes = reduce(entries);
        let graph = layout(nodes, &self.config.layout)?;

        let traces = if trace_ids.is_empty() || self.traces.is_none() {
            Vec::new()
        } else {
            match self.analyze_traces(&trace_ids).await {
                Ok(analyses) => analyses,
                Err(e) => {
                    tracing::warn!(
                        contact_id = %request.contact_id,
                        error = %e,
                        "Trace lookup failed, returning graph without traces"
                    );
                    Vec::new()
                }
            }
        };

        tracing::info!(
            contact_id = %request.contact_id,
            entries = entry_count,
            nodes = graph.nodes.len(),
            errors = graph.error_count(),
            traces = traces.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Contact trace built"
        );

        Ok(ContactTrace {
            contact_id: request.contact_id.clone(),
            graph,
            trace_ids,
            traces,
            entry_count,
        })
    }

    /// Run a free-form query over one partition, one branch per month of
    /// `[start_date, end_date]`, deduplicated by the configured field
    pub async fn search(
        &self,
        partition: &str,
        query: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ResultRow>> {
        if start_date > end_date {
            return Err(FlowTraceError::invalid_input(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }

        let fanout = FanOutAggregator::new(self.runner())
            .with_dedup_field(self.config.search_dedup_field.clone());
        let rows = fanout.run_months(partition, query, start_date, end_date).await;

        tracing::info!(partition = partition, rows = rows.len(), "Search complete");
        Ok(rows)
    }

    /// Fetch and analyse distributed traces
    pub async fn analyze_traces(&self, trace_ids: &[String]) -> Result<Vec<TraceAnalysis>> {
        let source = self
            .traces
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("no trace source configured".to_string()))?;

        if trace_ids.is_empty() {
            return Ok(Vec::new());
        }

        let batch = source.batch_get_traces(trace_ids).await?;
        Ok(parse_batch(&batch))
    }
}
