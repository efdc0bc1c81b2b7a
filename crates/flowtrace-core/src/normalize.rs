//! Query rows to structured log entries
//!
//! Every row becomes exactly one [`LogEntry`]. A row whose `@message` is not
//! a JSON object still yields an entry carrying its timestamp and raw text,
//! with an empty module type.

use crate::model::{row_value, LogEntry, ResultField, ResultRow};
use serde_json::{Map, Value};
use std::collections::HashSet;

const TIMESTAMP_FIELD: &str = "@timestamp";
const MESSAGE_FIELD: &str = "@message";

fn text_field(message: &Map<String, Value>, key: &str) -> Option<String> {
    match message.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Convert one raw result row into a log entry
pub fn normalize_row(row: &[ResultField]) -> LogEntry {
    let row_timestamp = row_value(row, TIMESTAMP_FIELD).unwrap_or_default().to_string();
    let raw = row_value(row, MESSAGE_FIELD).unwrap_or_default();

    let message = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            return LogEntry {
                timestamp: row_timestamp,
                raw_message: Some(raw.to_string()),
                ..Default::default()
            };
        }
    };

    LogEntry {
        contact_id: text_field(&message, "ContactId").unwrap_or_default(),
        flow_id: text_field(&message, "ContactFlowId").unwrap_or_default(),
        flow_name: text_field(&message, "ContactFlowName").unwrap_or_default(),
        module_type: text_field(&message, "ContactFlowModuleType").unwrap_or_default(),
        timestamp: text_field(&message, "Timestamp").unwrap_or(row_timestamp),
        parameters: message.get("Parameters").cloned().unwrap_or(Value::Null),
        results: text_field(&message, "Results"),
        external_results: message.get("ExternalResults").filter(|v| !v.is_null()).cloned(),
        identifier: text_field(&message, "Identifier"),
        raw_message: None,
        xray_trace_id: text_field(&message, "xray_trace_id")
            .or_else(|| text_field(&message, "XrayTraceId")),
    }
}

/// Convert rows in order
pub fn normalize_rows(rows: &[ResultRow]) -> Vec<LogEntry> {
    rows.iter().map(|row| normalize_row(row)).collect()
}

/// Stable chronological sort.
///
/// An entry whose timestamp does not parse sorts with the nearest parsable
/// entry before it (or the first one after it, when none precedes), so it
/// stays beside the neighbours it was logged with.
pub fn sort_chronologically(entries: &mut Vec<LogEntry>) {
    let parsed: Vec<_> = entries.iter().map(LogEntry::parsed_timestamp).collect();
    let mut carried = parsed.iter().flatten().next().copied();

    let mut keyed: Vec<_> = parsed
        .into_iter()
        .map(|ts| {
            if ts.is_some() {
                carried = ts;
            }
            carried
        })
        .zip(entries.drain(..))
        .collect();

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    entries.extend(keyed.into_iter().map(|(_, entry)| entry));
}

/// Distributed-trace ids carried by the entries, first-seen order, no repeats
pub fn discover_trace_ids(entries: &[LogEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|e| e.xray_trace_id.as_deref())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}
