//! Distributed-trace analysis
//!
//! A trace arrives as a batch of raw segments, each holding a JSON document
//! with nested `subsegments`. Parsing builds an owned segment tree per
//! document, computes whole-trace aggregates over every node, then elides
//! carrier segments (runtime wrappers such as `Invocation` or `Overhead`) by
//! splicing their children into the parent.

mod label;
mod parser;

pub use label::SegmentLabel;
pub use parser::{elide, is_carrier, parse_document, CARRIER_NAMES};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Trace parsing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    /// One segment document could not be decoded
    #[error("Malformed segment document {segment_id}: {message}")]
    MalformedDocument { segment_id: String, message: String },

    /// The batch envelope itself could not be decoded
    #[error("Invalid trace batch: {0}")]
    InvalidBatch(String),
}

/// `BatchGetTraces`-shaped response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TraceBatch {
    #[serde(default)]
    pub traces: Vec<RawTrace>,
}

impl TraceBatch {
    pub fn from_json(text: &str) -> Result<Self, TraceError> {
        serde_json::from_str(text).map_err(|e| TraceError::InvalidBatch(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawTrace {
    pub id: String,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

/// One segment as delivered: its id and the JSON document text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawSegment {
    pub id: String,
    pub document: String,
}

/// A node of the segment tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSegment {
    pub id: String,
    pub name: String,
    /// Epoch seconds
    pub start_time: f64,
    /// Epoch seconds; equals `start_time` for in-progress segments
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub error: bool,
    pub fault: bool,
    pub throttle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
    /// Connector label, for the call kinds that get one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_label: Option<SegmentLabel>,
    pub children: Vec<TraceSegment>,
}

impl TraceSegment {
    /// `aws.operation`, when the segment is an AWS SDK call
    pub fn operation(&self) -> Option<&str> {
        self.aws.as_ref()?.get("operation")?.as_str()
    }

    /// Resource the operation acted on: first resource name, else table
    /// name, else the segment name
    pub fn resource(&self) -> &str {
        let aws = self.aws.as_ref();
        aws.and_then(|a| a.pointer("/resource_names/0"))
            .and_then(Value::as_str)
            .or_else(|| aws.and_then(|a| a.get("table_name")).and_then(Value::as_str))
            .unwrap_or(self.name.as_str())
    }

    /// Visit this segment and every descendant depth-first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TraceSegment)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Whole-trace view handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceAnalysis {
    pub trace_id: String,
    /// Segment forest with carriers elided
    pub segments: Vec<TraceSegment>,
    /// Seconds from the earliest start to the latest end
    pub duration: f64,
    pub has_error: bool,
    pub has_fault: bool,
    pub has_throttle: bool,
    /// `"<operation> <resource>"` per distinct call, first-seen order
    pub operation_summary: Vec<String>,
    /// Segments whose documents could not be decoded
    pub dropped_segments: usize,
}

#[derive(Default)]
struct Aggregates {
    earliest: Option<f64>,
    latest: Option<f64>,
    error: bool,
    fault: bool,
    throttle: bool,
}

impl Aggregates {
    fn add(&mut self, segment: &TraceSegment) {
        self.earliest = Some(self.earliest.map_or(segment.start_time, |t| t.min(segment.start_time)));
        self.latest = Some(self.latest.map_or(segment.end_time, |t| t.max(segment.end_time)));
        self.error |= segment.error;
        self.fault |= segment.fault;
        self.throttle |= segment.throttle;
    }

    fn duration(&self) -> f64 {
        match (self.earliest, self.latest) {
            (Some(start), Some(end)) => (end - start).max(0.0),
            _ => 0.0,
        }
    }
}

fn operation_summary(forest: &[TraceSegment]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for root in forest {
        root.walk(&mut |segment| {
            if let Some(operation) = segment.operation() {
                let line = format!("{} {}", operation, segment.resource());
                if seen.insert(line.clone()) {
                    lines.push(line);
                }
            }
        });
    }
    lines
}

/// Parse every segment of one trace and summarise it.
///
/// Malformed documents are skipped and counted; they never fail the trace.
pub fn parse_trace(raw: &RawTrace) -> TraceAnalysis {
    let mut roots = Vec::with_capacity(raw.segments.len());
    let mut dropped = 0;

    for segment in &raw.segments {
        match parse_document(&segment.id, &segment.document) {
            Ok(root) => roots.push(root),
            Err(e) => {
                dropped += 1;
                tracing::warn!(trace_id = %raw.id, error = %e, "Dropping malformed trace segment");
            }
        }
    }

    let mut totals = Aggregates::default();
    for root in &roots {
        root.walk(&mut |segment| totals.add(segment));
    }

    let segments = elide(roots);
    let operation_summary = operation_summary(&segments);

    tracing::debug!(
        trace_id = %raw.id,
        roots = segments.len(),
        dropped = dropped,
        "Parsed trace"
    );

    TraceAnalysis {
        trace_id: raw.id.clone(),
        duration: totals.duration(),
        has_error: totals.error,
        has_fault: totals.fault,
        has_throttle: totals.throttle,
        segments,
        operation_summary,
        dropped_segments: dropped,
    }
}

/// Analyse every trace of a batch, in batch order
pub fn parse_batch(batch: &TraceBatch) -> Vec<TraceAnalysis> {
    batch.traces.iter().map(parse_trace).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str, docs: Vec<Value>) -> RawTrace {
        RawTrace {
            id: id.to_string(),
            segments: docs
                .into_iter()
                .enumerate()
                .map(|(i, doc)| RawSegment {
                    id: format!("seg-{}", i),
                    document: doc.to_string(),
                })
                .collect(),
        }
    }

    fn lambda_trace() -> Value {
        json!({
            "id": "root",
            "name": "my-function",
            "origin": "AWS::Lambda::Function",
            "start_time": 100.0,
            "end_time": 101.5,
            "subsegments": [
                {
                    "id": "inv",
                    "name": "Invocation",
                    "start_time": 100.1,
                    "end_time": 101.4,
                    "subsegments": [
                        {
                            "id": "ddb",
                            "name": "DynamoDB",
                            "namespace": "aws",
                            "start_time": 100.2,
                            "end_time": 100.3,
                            "aws": {"operation": "GetItem", "table_name": "customers"}
                        },
                        {
                            "id": "ddb-2",
                            "name": "DynamoDB",
                            "namespace": "aws",
                            "start_time": 100.4,
                            "end_time": 100.5,
                            "aws": {"operation": "GetItem", "table_name": "customers"}
                        },
                        {
                            "id": "attempt",
                            "name": "Attempt #1",
                            "start_time": 100.6,
                            "end_time": 100.9,
                            "fault": true,
                            "subsegments": [
                                {
                                    "id": "ssm",
                                    "name": "SSM",
                                    "start_time": 100.6,
                                    "end_time": 100.7,
                                    "aws": {"operation": "GetParameter", "resource_names": ["arn:aws:ssm:param/app/key"]}
                                }
                            ]
                        }
                    ]
                },
                {"id": "ovh", "name": "Overhead", "start_time": 101.4, "end_time": 102.0}
            ]
        })
    }

    #[test]
    fn test_carrier_children_reparented() {
        let analysis = parse_trace(&raw("1-abc", vec![lambda_trace()]));

        assert_eq!(analysis.segments.len(), 1);
        let root = &analysis.segments[0];
        let child_ids: Vec<_> = root.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(child_ids, vec!["ddb", "ddb-2", "ssm"]);
        assert!(root.children.iter().all(|c| c.parent_id.as_deref() == Some("root")));
    }

    #[test]
    fn test_aggregates_include_carriers() {
        let analysis = parse_trace(&raw("1-abc", vec![lambda_trace()]));

        // Overhead ends last; the fault sits on an elided Attempt wrapper
        assert!((analysis.duration - 2.0).abs() < 1e-9);
        assert!(analysis.has_fault);
        assert!(!analysis.has_error);
        assert!(!analysis.has_throttle);
    }

    #[test]
    fn test_operation_summary_dedups() {
        let analysis = parse_trace(&raw("1-abc", vec![lambda_trace()]));
        assert_eq!(
            analysis.operation_summary,
            vec!["GetItem customers", "GetParameter arn:aws:ssm:param/app/key"]
        );
    }

    #[test]
    fn test_error_found_at_depth() {
        let doc = json!({
            "id": "a", "name": "api", "start_time": 1.0, "end_time": 2.0,
            "subsegments": [{
                "id": "b", "name": "inner", "start_time": 1.0, "end_time": 1.5,
                "subsegments": [{
                    "id": "c", "name": "leaf", "start_time": 1.1, "end_time": 1.2,
                    "error": true, "throttle": true
                }]
            }]
        });
        let analysis = parse_trace(&raw("t", vec![doc]));
        assert!(analysis.has_error);
        assert!(analysis.has_throttle);
        assert_eq!(analysis.segments[0].children[0].children[0].id, "c");
    }

    #[test]
    fn test_malformed_segment_dropped() {
        let mut trace = raw("t", vec![json!({"id": "ok", "name": "svc", "start_time": 5.0, "end_time": 6.0})]);
        trace.segments.push(RawSegment {
            id: "bad".to_string(),
            document: "{not json".to_string(),
        });

        let analysis = parse_trace(&trace);
        assert_eq!(analysis.segments.len(), 1);
        assert_eq!(analysis.dropped_segments, 1);
        assert!((analysis.duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_trace() {
        let analysis = parse_trace(&raw("t", Vec::new()));
        assert_eq!(analysis.duration, 0.0);
        assert!(analysis.segments.is_empty());
    }

    #[test]
    fn test_batch_envelope() {
        let text = json!({
            "Traces": [{
                "Id": "1-abc",
                "Segments": [{"Id": "s1", "Document": lambda_trace().to_string()}]
            }]
        })
        .to_string();

        let batch = TraceBatch::from_json(&text).unwrap();
        let analyses = parse_batch(&batch);
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].trace_id, "1-abc");

        assert!(matches!(TraceBatch::from_json("[]"), Err(TraceError::InvalidBatch(_))));
    }

    #[test]
    fn test_serialized_shape() {
        let analysis = parse_trace(&raw("1-abc", vec![lambda_trace()]));
        let value = serde_json::to_value(&analysis).unwrap();

        assert_eq!(value["traceId"], "1-abc");
        assert_eq!(value["hasFault"], true);
        assert_eq!(value["segments"][0]["startTime"], 100.0);
        assert_eq!(value["segments"][0]["children"][0]["parentId"], "root");
    }

    #[test]
    fn test_edge_labels_serialized_on_children() {
        let analysis = parse_trace(&raw("1-abc", vec![lambda_trace()]));
        let value = serde_json::to_value(&analysis).unwrap();
        let children = &value["segments"][0]["children"];

        assert_eq!(children[0]["edgeLabel"]["label"], "GetItem\ncustomers");
        // SSM surfaced from under the Attempt wrapper keeps its label
        assert_eq!(children[2]["edgeLabel"]["label"], "GetParameter\nkey");
        assert!(children[0]["edgeLabel"].get("errorLabel").is_none());
        // Plain function segments carry no label
        assert!(value["segments"][0].get("edgeLabel").is_none());
    }
}
