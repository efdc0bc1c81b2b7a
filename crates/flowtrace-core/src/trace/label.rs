//! Connector labels for downstream calls.

use super::TraceSegment;
use serde::Serialize;
use serde_json::Value;

/// Services whose label is the operation plus the tail of the resource name
const RESOURCE_SERVICES: &[&str] = &["SSM", "Connect", "SecretsManager", "SQS", "S3"];

const DYNAMODB: &str = "DynamoDB";

/// Text drawn on the edge leading into a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentLabel {
    pub label: String,
    /// Set when the call failed visibly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_label: Option<String>,
}

fn aws_str<'a>(segment: &'a TraceSegment, pointer: &str) -> Option<&'a str> {
    segment.aws.as_ref()?.pointer(pointer)?.as_str()
}

fn join_lines(first: &str, second: Option<&str>) -> String {
    match second {
        Some(s) if !s.is_empty() => format!("{}\n{}", first, s),
        _ => first.to_string(),
    }
}

impl TraceSegment {
    /// Label for the edge into this segment, for the call kinds that get one
    ///
    /// * AWS resource services: operation and last path segment of the first
    ///   resource name
    /// * DynamoDB: operation and table name
    /// * HTTP targets (names containing `.`): method and URL path, with a
    ///   non-2xx status or the first cause exception as the error label
    pub fn connector_label(&self) -> Option<SegmentLabel> {
        if RESOURCE_SERVICES.contains(&self.name.as_str()) {
            let operation = aws_str(self, "/operation")?;
            let tail = aws_str(self, "/resource_names/0").and_then(|r| r.rsplit('/').next());
            return Some(SegmentLabel {
                label: join_lines(operation, tail),
                error_label: None,
            });
        }

        if self.name == DYNAMODB {
            let operation = aws_str(self, "/operation")?;
            return Some(SegmentLabel {
                label: join_lines(operation, aws_str(self, "/table_name")),
                error_label: None,
            });
        }

        if self.name.contains('.') {
            return self.http_label();
        }

        None
    }

    fn http_label(&self) -> Option<SegmentLabel> {
        let http = self.http.as_ref()?;
        let method = http.pointer("/request/method").and_then(Value::as_str)?;
        let url = http.pointer("/request/url").and_then(Value::as_str).unwrap_or("");
        // Drop scheme and host: "https://host/a/b" -> "a/b"
        let path = url.split('/').skip(3).collect::<Vec<_>>().join("/");

        let error_label = match http.pointer("/response/status") {
            Some(status) => {
                let status = match status {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (!status.starts_with('2')).then_some(status)
            }
            None => self
                .cause
                .as_ref()
                .and_then(|c| c.pointer("/exceptions/0/message"))
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        Some(SegmentLabel {
            label: join_lines(method, Some(&path)),
            error_label,
        })
    }
}
