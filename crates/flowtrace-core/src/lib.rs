//! Execution trace reconstruction for contact-center flow logs.
//!
//! Turns a chronological, flat sequence of module-execution log entries into a
//! reviewable execution graph, and distributed-trace documents into a
//! flattened segment tree with whole-trace aggregates.
//!
//! # Pipeline
//!
//! ```text
//! LogQueryBackend ─► AsyncQueryRunner ─► FanOutAggregator
//!                                              │ rows
//!                                              ▼
//!                         normalize ─► enrich ─► reduce ─► layout ─► ExecutionGraph
//!
//! TraceSource ─► trace::parse_batch ─► TraceAnalysis   (per discovered trace id)
//! ```
//!
//! The reducer, layout engine and trace parser are pure functions over
//! already-fetched data. All I/O goes through the traits in [`backend`], so
//! callers pass their own clients into each [`ContactTracer`] instead of
//! relying on process-wide singletons.

pub mod backend;
pub mod config;
pub mod enrich;
pub mod error;
pub mod layout;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod reduce;
pub mod trace;

pub use backend::{BackendError, BackendResult, FlowDefinitionSource, LogQueryBackend, TraceSource};
pub use config::{PollPolicy, TracerConfig, TracerConfigBuilder};
pub use enrich::{AttributeEnricher, FlowContentSource};
pub use error::{FlowTraceError, Result};
pub use layout::{layout, Edge, ExecutionGraph, GraphNode, HandleSide, LayoutConfig, LayoutError, Position};
pub use model::{AsyncQuery, LogEntry, QueryResults, QueryStatus, ResultField, ResultRow};
pub use normalize::{discover_trace_ids, normalize_row, normalize_rows, sort_chronologically};
pub use pipeline::{build_graph, ContactTrace, ContactTraceRequest, ContactTracer};
pub use query::{
    month_buckets, month_windows, AsyncQueryRunner, FanOutAggregator, MonthWindow, PollStep,
    QueryBranch, QueryError,
};
pub use reduce::{reduce, GroupedNode, NodeKind, TimeRange};
pub use trace::{parse_batch, parse_trace, TraceAnalysis, TraceBatch, TraceError, TraceSegment};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
