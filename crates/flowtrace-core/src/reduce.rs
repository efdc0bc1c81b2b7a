//! Run-length reduction of flow-log entries
//!
//! One forward pass turns a chronological entry sequence into display nodes:
//!
//! 1. `InvokeFlowModule` closes any open attribute run, then absorbs the
//!    contiguous entries logged from inside the invoked module (flow name
//!    carrying [`MODULE_FLOW_MARKER`], all with the same name) plus one
//!    trailing `ReturnFromFlowModule`. With at least one member the result is
//!    a [`NodeKind::ModuleGroup`]; otherwise the invocation is kept as is.
//! 2. Attribute-style entries accumulate into a run. A change of type seals
//!    the run even without an unrelated entry in between.
//! 3. Anything else closes the run and is kept as is.
//!
//! Module members and module returns outside a scan are dropped.
//! Grouping is contiguous-only and order-preserving.
//!
//! [`MODULE_FLOW_MARKER`]: crate::model::MODULE_FLOW_MARKER

use crate::model::{compare_timestamps, LogEntry};
use serde::Serialize;
use serde_json::Value;
use std::iter::Peekable;

/// Result shown for an error group whose last member reported nothing
pub const GROUP_ERROR_RESULT: &str = "Error in group";

/// First and last timestamp covered by a module group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// Composite tag of a reduced node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    Leaf,
    AttributeGroup {
        members: Vec<LogEntry>,
    },
    #[serde(rename_all = "camelCase")]
    ModuleGroup {
        members: Vec<LogEntry>,
        module_name: String,
        log_count: usize,
        time_range: TimeRange,
    },
}

/// A display node: a log-entry-shaped record plus its composite tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedNode {
    #[serde(flatten)]
    pub entry: LogEntry,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub has_error: bool,
}

impl GroupedNode {
    /// A single entry kept as is
    pub fn leaf(entry: LogEntry) -> Self {
        let has_error = entry.is_error();
        Self {
            entry,
            kind: NodeKind::Leaf,
            has_error,
        }
    }

    /// Merge a contiguous run of same-type attribute entries.
    ///
    /// Panics on an empty run; callers only merge runs of two or more.
    fn attribute_group(members: Vec<LogEntry>) -> Self {
        let has_error = members.iter().any(LogEntry::is_error);
        let comparison = members[0].is_comparison_type();

        let parameters = members
            .iter()
            .map(|member| {
                let mut params = member.parameters.clone();
                // Per-check outcomes stay visible after merging
                if comparison {
                    if let Value::Object(map) = &mut params {
                        map.insert(
                            "Results".to_string(),
                            member.results.clone().map(Value::String).unwrap_or(Value::Null),
                        );
                    }
                }
                params
            })
            .collect();

        let mut entry = members[members.len() - 1].clone();
        entry.parameters = Value::Array(parameters);
        if has_error && entry.results_text().is_empty() {
            entry.results = Some(GROUP_ERROR_RESULT.to_string());
        }

        Self {
            entry,
            kind: NodeKind::AttributeGroup { members },
            has_error,
        }
    }

    /// Collapse the entries of one module invocation.
    ///
    /// Panics on an empty member list.
    fn module_group(members: Vec<LogEntry>) -> Self {
        let has_error = members.iter().any(LogEntry::is_error);
        let entry = members[0].clone();

        let start = members
            .iter()
            .min_by(|a, b| compare_timestamps(a, b))
            .map(|e| e.timestamp.clone())
            .unwrap_or_default();
        let end = members
            .iter()
            .max_by(|a, b| compare_timestamps(a, b))
            .map(|e| e.timestamp.clone())
            .unwrap_or_default();

        Self {
            kind: NodeKind::ModuleGroup {
                module_name: entry.flow_name.clone(),
                log_count: members.len(),
                time_range: TimeRange { start, end },
                members,
            },
            entry,
            has_error,
        }
    }

    /// Entries this node stands for, in order
    pub fn members(&self) -> &[LogEntry] {
        match &self.kind {
            NodeKind::Leaf => std::slice::from_ref(&self.entry),
            NodeKind::AttributeGroup { members } | NodeKind::ModuleGroup { members, .. } => members,
        }
    }
}

/// Pending run of attribute-style entries
#[derive(Default)]
struct AttributeRun {
    module_type: String,
    members: Vec<LogEntry>,
}

impl AttributeRun {
    fn push(&mut self, entry: LogEntry, out: &mut Vec<GroupedNode>) {
        if !self.members.is_empty() && self.module_type != entry.module_type {
            self.flush(out);
        }
        self.module_type = entry.module_type.clone();
        self.members.push(entry);
    }

    fn flush(&mut self, out: &mut Vec<GroupedNode>) {
        let mut members = std::mem::take(&mut self.members);
        match members.len() {
            0 => {}
            1 => out.push(GroupedNode::leaf(members.remove(0))),
            _ => out.push(GroupedNode::attribute_group(members)),
        }
    }
}

/// Absorb the entries of the module invoked just before `iter`'s position.
fn scan_module<I>(iter: &mut Peekable<I>) -> Vec<LogEntry>
where
    I: Iterator<Item = LogEntry>,
{
    let is_member = |e: &LogEntry| e.is_module_member() && !e.is_module_return();

    let module_name = match iter.peek() {
        Some(next) if is_member(next) => Some(next.flow_name.clone()),
        _ => None,
    };

    let mut members = Vec::new();
    if let Some(name) = module_name {
        while let Some(entry) = iter.next_if(|e| is_member(e) && e.flow_name == name) {
            members.push(entry);
        }
    }

    if let Some(ret) = iter.next_if(LogEntry::is_module_return) {
        tracing::trace!(flow = %ret.flow_name, "Consumed module return");
    }
    members
}

/// Reduce a chronological entry sequence to display nodes.
///
/// Pure: no I/O, never fails.
pub fn reduce(entries: Vec<LogEntry>) -> Vec<GroupedNode> {
    let mut out = Vec::with_capacity(entries.len());
    let mut run = AttributeRun::default();
    let mut iter = entries.into_iter().peekable();

    while let Some(entry) = iter.next() {
        if entry.is_module_invocation() {
            run.flush(&mut out);
            let members = scan_module(&mut iter);
            if members.is_empty() {
                out.push(GroupedNode::leaf(entry));
            } else {
                out.push(GroupedNode::module_group(members));
            }
        } else if entry.is_module_member() || entry.is_module_return() {
            tracing::debug!(
                flow = %entry.flow_name,
                module_type = %entry.module_type,
                timestamp = %entry.timestamp,
                "Dropping module entry outside a module invocation"
            );
        } else if entry.is_attribute_type() {
            run.push(entry, &mut out);
        } else {
            run.flush(&mut out);
            out.push(GroupedNode::leaf(entry));
        }
    }

    run.flush(&mut out);
    out
}
