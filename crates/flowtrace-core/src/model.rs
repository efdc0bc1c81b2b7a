//! Shared data model: flow-log entries, raw query rows and query state.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// `@timestamp` layout of query result rows
const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Module types the reducer and enricher treat specially.
pub mod module_type {
    pub const INVOKE_FLOW_MODULE: &str = "InvokeFlowModule";
    pub const RETURN_FROM_FLOW_MODULE: &str = "ReturnFromFlowModule";
    pub const SET_ATTRIBUTES: &str = "SetAttributes";
    pub const SET_FLOW_ATTRIBUTES: &str = "SetFlowAttributes";
    pub const CHECK_ATTRIBUTE: &str = "CheckAttribute";
    pub const SET_CONTACT_FLOW: &str = "SetContactFlow";
}

/// Flow-name marker carried by every entry logged from inside a flow module.
pub const MODULE_FLOW_MARKER: &str = "MOD_";

/// Result substrings that mark a module execution as failed.
pub const ERROR_KEYWORDS: &[&str] = &[
    "Error",
    "Failed",
    "Timeout",
    "Exception",
    "No prompt provided",
    "Instance has reached concurrent Lambda thread access limit",
    "Unsupported",
    "Invalid",
    "not found",
    "NotDone",
    "MultipleFound",
    "The Lambda Function Returned An Error.",
];

/// Entry types merged into attribute groups when they run contiguously.
pub const ATTRIBUTE_MODULE_TYPES: &[&str] = &[
    module_type::SET_ATTRIBUTES,
    module_type::SET_FLOW_ATTRIBUTES,
    module_type::CHECK_ATTRIBUTE,
];

/// Entry types whose parameters describe a comparison.
pub const COMPARISON_MODULE_TYPES: &[&str] = &[module_type::CHECK_ATTRIBUTE];

/// One module-execution record from a contact flow log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub contact_id: String,
    pub flow_id: String,
    pub flow_name: String,
    /// Empty when the row could not be parsed.
    pub module_type: String,
    pub timestamp: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Original message text when it was not a JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xray_trace_id: Option<String>,
}

impl LogEntry {
    /// Results text, or the empty string when absent
    pub fn results_text(&self) -> &str {
        self.results.as_deref().unwrap_or("")
    }

    /// The `isSuccess` flag of an external invocation, if reported
    pub fn external_success(&self) -> Option<&str> {
        self.external_results
            .as_ref()
            .and_then(|r| r.get("isSuccess"))
            .and_then(Value::as_str)
    }

    /// Whether this execution failed.
    ///
    /// True when the results text contains any of [`ERROR_KEYWORDS`] or the
    /// external result reports `isSuccess == "false"`.
    pub fn is_error(&self) -> bool {
        let results = self.results_text();
        ERROR_KEYWORDS.iter().any(|k| results.contains(k)) || self.external_success() == Some("false")
    }

    /// Whether the entry was logged from inside a flow module
    pub fn is_module_member(&self) -> bool {
        self.flow_name.contains(MODULE_FLOW_MARKER)
    }

    pub fn is_module_invocation(&self) -> bool {
        self.module_type == module_type::INVOKE_FLOW_MODULE
    }

    pub fn is_module_return(&self) -> bool {
        self.module_type == module_type::RETURN_FROM_FLOW_MODULE
    }

    pub fn is_attribute_type(&self) -> bool {
        ATTRIBUTE_MODULE_TYPES.contains(&self.module_type.as_str())
    }

    pub fn is_comparison_type(&self) -> bool {
        COMPARISON_MODULE_TYPES.contains(&self.module_type.as_str())
    }

    /// Parsed timestamp: RFC 3339, or the query engine's
    /// `YYYY-MM-DD HH:MM:SS.mmm` form read as UTC
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(&self.timestamp, QUERY_TIMESTAMP_FORMAT)
                    .map(|t| t.and_utc())
            })
            .ok()
    }

    /// Module type refined by the flow kind a `SetContactFlow` block installs.
    pub fn display_module_type(&self) -> &str {
        if self.module_type != module_type::SET_CONTACT_FLOW {
            return &self.module_type;
        }

        match self.parameters.get("Type").and_then(Value::as_str) {
            Some("CustomerHold") | Some("AgentHold") => "SetHoldFlow",
            Some("CustomerWhisper") | Some("AgentWhisper") => "SetWhisperFlow",
            Some("CustomerQueue") => "SetCustomerQueueFlow",
            Some("DefaultAgentUI") => "SetEventHook",
            _ => &self.module_type,
        }
    }
}

/// Order two entries by timestamp, falling back to the raw text when either
/// side does not parse.
pub fn compare_timestamps(a: &LogEntry, b: &LogEntry) -> Ordering {
    match (a.parsed_timestamp(), b.parsed_timestamp()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.timestamp.cmp(&b.timestamp),
    }
}

/// One `{field, value}` cell of a query result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultField {
    pub field: String,
    pub value: String,
}

impl ResultField {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A raw query result row.
pub type ResultRow = Vec<ResultField>;

/// Look up a field value in a row
pub fn row_value<'a>(row: &'a [ResultField], field: &str) -> Option<&'a str> {
    row.iter()
        .find(|cell| cell.field == field)
        .map(|cell| cell.value.as_str())
}

/// Lifecycle status of an asynchronous log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    Scheduled,
    Running,
    Complete,
    Failed,
    Cancelled,
    Timeout,
    /// Any status string the backend reports that is not recognised.
    #[serde(other)]
    Unknown,
}

impl QueryStatus {
    /// Whether polling can stop
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryStatus::Scheduled | QueryStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Scheduled => "Scheduled",
            QueryStatus::Running => "Running",
            QueryStatus::Complete => "Complete",
            QueryStatus::Failed => "Failed",
            QueryStatus::Cancelled => "Cancelled",
            QueryStatus::Timeout => "Timeout",
            QueryStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of one `getQueryResults` round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub status: QueryStatus,
    #[serde(default)]
    pub rows: Vec<ResultRow>,
}

impl QueryResults {
    pub fn pending(status: QueryStatus) -> Self {
        Self {
            status,
            rows: Vec::new(),
        }
    }

    pub fn complete(rows: Vec<ResultRow>) -> Self {
        Self {
            status: QueryStatus::Complete,
            rows,
        }
    }
}

/// Client-side view of a submitted query.
///
/// Created on submission in `Scheduled` state and mutated only by
/// [`AsyncQuery::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncQuery {
    pub id: String,
    pub status: QueryStatus,
    pub rows: Vec<ResultRow>,
}

impl AsyncQuery {
    pub fn submitted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: QueryStatus::Scheduled,
            rows: Vec::new(),
        }
    }

    pub fn from_results(id: impl Into<String>, results: QueryResults) -> Self {
        Self {
            id: id.into(),
            status: results.status,
            rows: results.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(results: Option<&str>, external: Option<Value>) -> LogEntry {
        LogEntry {
            module_type: "InvokeExternalResource".to_string(),
            results: results.map(str::to_string),
            external_results: external,
            ..Default::default()
        }
    }

    #[test]
    fn test_error_keywords() {
        assert!(entry(Some("Error"), None).is_error());
        assert!(entry(Some("Contact not found"), None).is_error());
        assert!(entry(Some("MultipleFound"), None).is_error());
        assert!(!entry(Some("Success"), None).is_error());
        assert!(!entry(None, None).is_error());
    }

    #[test]
    fn test_external_success_flag() {
        assert!(entry(None, Some(json!({"isSuccess": "false"}))).is_error());
        assert!(!entry(None, Some(json!({"isSuccess": "true"}))).is_error());
        // Only the string form is a failure marker
        assert!(!entry(None, Some(json!({"isSuccess": false}))).is_error());
    }

    #[test]
    fn test_display_module_type() {
        let mut e = LogEntry {
            module_type: "SetContactFlow".to_string(),
            parameters: json!({"Type": "CustomerQueue"}),
            ..Default::default()
        };
        assert_eq!(e.display_module_type(), "SetCustomerQueueFlow");

        e.parameters = json!({"Type": "AgentWhisper"});
        assert_eq!(e.display_module_type(), "SetWhisperFlow");

        e.parameters = json!({"Type": "Other"});
        assert_eq!(e.display_module_type(), "SetContactFlow");

        e.module_type = "PlayPrompt".to_string();
        assert_eq!(e.display_module_type(), "PlayPrompt");
    }

    #[test]
    fn test_query_status_terminal() {
        assert!(!QueryStatus::Scheduled.is_terminal());
        assert!(!QueryStatus::Running.is_terminal());
        assert!(QueryStatus::Complete.is_terminal());
        assert!(QueryStatus::Failed.is_terminal());
        assert!(QueryStatus::Cancelled.is_terminal());
        assert!(QueryStatus::Timeout.is_terminal());
        assert!(QueryStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_query_status_unknown_string() {
        let results: QueryResults =
            serde_json::from_value(json!({"status": "Exploded", "rows": []})).unwrap();
        assert_eq!(results.status, QueryStatus::Unknown);

        let results: QueryResults = serde_json::from_value(json!({"status": "Running"})).unwrap();
        assert_eq!(results.status, QueryStatus::Running);
        assert!(results.rows.is_empty());
    }

    #[test]
    fn test_compare_timestamps() {
        let a = LogEntry {
            timestamp: "2024-01-01T00:00:01.000Z".to_string(),
            ..Default::default()
        };
        let b = LogEntry {
            timestamp: "2024-01-01T09:00:00+09:00".to_string(),
            ..Default::default()
        };
        // b is midnight UTC, a is one second later
        assert_eq!(compare_timestamps(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_query_timestamp_form_parses_as_utc() {
        let entry = LogEntry {
            timestamp: "2024-05-01 10:00:01.500".to_string(),
            ..Default::default()
        };
        let rfc = LogEntry {
            timestamp: "2024-05-01T10:00:01.500Z".to_string(),
            ..Default::default()
        };
        assert_eq!(entry.parsed_timestamp(), rfc.parsed_timestamp());
        assert!(entry.parsed_timestamp().is_some());
    }
}
