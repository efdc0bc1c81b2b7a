//! Segment document decoding and carrier elision.

use super::{TraceError, TraceSegment};
use serde::Deserialize;
use serde_json::Value;

/// Runtime wrapper segments that are never shown on their own
pub const CARRIER_NAMES: &[&str] = &[
    "Invocation",
    "Overhead",
    "Dwell Time",
    "Lambda",
    "QueueTime",
    "Initialization",
];

/// Wire shape of a segment or subsegment document
#[derive(Debug, Deserialize)]
struct SegmentDocument {
    id: String,
    #[serde(default)]
    name: String,
    start_time: f64,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    fault: bool,
    #[serde(default)]
    throttle: bool,
    #[serde(default)]
    aws: Option<Value>,
    #[serde(default)]
    http: Option<Value>,
    #[serde(default)]
    cause: Option<Value>,
    #[serde(default)]
    subsegments: Vec<SegmentDocument>,
}

impl SegmentDocument {
    fn into_segment(self, parent: Option<&str>) -> TraceSegment {
        let parent_id = self.parent_id.or_else(|| parent.map(str::to_string));
        let children = self
            .subsegments
            .into_iter()
            .map(|sub| sub.into_segment(Some(&self.id)))
            .collect();

        let mut segment = TraceSegment {
            end_time: self.end_time.unwrap_or(self.start_time),
            start_time: self.start_time,
            parent_id,
            namespace: self.namespace,
            origin: self.origin,
            error: self.error,
            fault: self.fault,
            throttle: self.throttle,
            aws: self.aws,
            http: self.http,
            cause: self.cause,
            children,
            name: self.name,
            id: self.id,
            edge_label: None,
        };
        segment.edge_label = segment.connector_label();
        segment
    }
}

/// Decode one segment document into a full tree, carriers included
pub fn parse_document(segment_id: &str, document: &str) -> Result<TraceSegment, TraceError> {
    let doc: SegmentDocument =
        serde_json::from_str(document).map_err(|e| TraceError::MalformedDocument {
            segment_id: segment_id.to_string(),
            message: e.to_string(),
        })?;
    Ok(doc.into_segment(None))
}

/// Whether a segment is a runtime wrapper
pub fn is_carrier(name: &str) -> bool {
    CARRIER_NAMES.contains(&name) || name.contains("Attempt")
}

/// Remove carriers, splicing their (already elided) children into the
/// carrier's place and re-pointing them at the carrier's parent.
pub fn elide(segments: Vec<TraceSegment>) -> Vec<TraceSegment> {
    let mut out = Vec::with_capacity(segments.len());
    for mut segment in segments {
        let children = elide(std::mem::take(&mut segment.children));
        if is_carrier(&segment.name) {
            out.extend(children.into_iter().map(|mut child| {
                child.parent_id = segment.parent_id.clone();
                child
            }));
        } else {
            segment.children = children;
            out.push(segment);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seg(id: &str, name: &str, children: Vec<TraceSegment>) -> TraceSegment {
        TraceSegment {
            id: id.to_string(),
            name: name.to_string(),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn test_carrier_names() {
        for name in CARRIER_NAMES {
            assert!(is_carrier(name));
        }
        assert!(is_carrier("Attempt #2"));
        assert!(!is_carrier("DynamoDB"));
        assert!(!is_carrier("lambda"));
    }

    #[test]
    fn test_single_carrier_with_one_child() {
        let mut carrier = seg("c", "Invocation", vec![seg("x", "S3", Vec::new())]);
        carrier.parent_id = Some("root".to_string());
        carrier.children[0].parent_id = Some("c".to_string());

        let out = elide(vec![seg("root", "fn", vec![carrier])]);
        assert_eq!(out[0].children.len(), 1);
        assert_eq!(out[0].children[0].id, "x");
        assert_eq!(out[0].children[0].parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn test_nested_carriers_splice_through() {
        let tree = seg(
            "root",
            "fn",
            vec![seg(
                "inv",
                "Invocation",
                vec![seg("att", "Attempt #1", vec![seg("a", "SQS", Vec::new()), seg("b", "S3", Vec::new())])],
            )],
        );

        let out = elide(vec![tree]);
        let ids: Vec<_> = out[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_top_level_carrier_splices_into_forest() {
        let out = elide(vec![
            seg("w", "Overhead", vec![seg("x", "svc", Vec::new())]),
            seg("y", "other", Vec::new()),
        ]);
        let ids: Vec<_> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_document_defaults() {
        let doc = json!({
            "id": "s1",
            "name": "svc",
            "start_time": 10.0,
            "in_progress": true,
            "subsegments": [{"id": "s2", "name": "child", "start_time": 10.5, "end_time": 11.0}]
        });
        let segment = parse_document("s1", &doc.to_string()).unwrap();

        assert_eq!(segment.end_time, 10.0);
        assert!(!segment.error);
        assert_eq!(segment.children[0].parent_id.as_deref(), Some("s1"));
        assert!(segment.edge_label.is_none());
    }

    #[test]
    fn test_parse_document_attaches_labels() {
        let doc = json!({
            "id": "s1",
            "name": "svc",
            "start_time": 1.0,
            "subsegments": [{
                "id": "s2",
                "name": "api.example.com",
                "start_time": 1.0,
                "http": {"request": {"method": "GET", "url": "https://api.example.com/v1/x"}, "response": {"status": 404}}
            }]
        });
        let segment = parse_document("s1", &doc.to_string()).unwrap();
        let label = segment.children[0].edge_label.as_ref().unwrap();

        assert_eq!(label.label, "GET\nv1/x");
        assert_eq!(label.error_label.as_deref(), Some("404"));
    }

    #[test]
    fn test_parse_document_missing_start_time() {
        let err = parse_document("s1", r#"{"id": "s1", "name": "svc"}"#).unwrap_err();
        assert!(matches!(err, TraceError::MalformedDocument { ref segment_id, .. } if segment_id == "s1"));
    }
}
