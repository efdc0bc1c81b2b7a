//! Comparison-operand enrichment
//!
//! A `CheckAttribute` log entry only records the runtime values that were
//! compared. The enricher looks up the authored expressions behind both
//! operands and attaches them to the entry's parameters. Enrichment is
//! best-effort: any lookup failure returns the entry untouched.

use crate::backend::{BackendError, BackendResult, FlowDefinitionSource};
use crate::model::LogEntry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Flow-definition field holding a comparison block's operand
pub const COMPARISON_VALUE_FIELD: &str = "ComparisonValue";

/// Parameter key for the resolved first operand
pub const RESOLVED_FIRST_KEY: &str = "ResolvedComparisonValue";

/// Parameter key for the resolved second operand
pub const RESOLVED_SECOND_KEY: &str = "ResolvedSecondComparisonValue";

/// Annotates comparison entries with their authored operands.
#[derive(Clone)]
pub struct AttributeEnricher {
    source: Arc<dyn FlowDefinitionSource>,
}

impl AttributeEnricher {
    pub fn new(source: Arc<dyn FlowDefinitionSource>) -> Self {
        Self { source }
    }

    /// Enrich one entry; never fails
    pub async fn enrich(&self, entry: LogEntry) -> LogEntry {
        if !entry.is_comparison_type() || !entry.parameters.is_object() {
            return entry;
        }

        let has_block = entry.identifier.as_deref().is_some_and(|id| !id.is_empty());
        if !has_block || entry.flow_id.is_empty() {
            return entry;
        }
        let flow_id = entry.flow_id.clone();
        let identifier = entry.identifier.clone().unwrap_or_default();

        match self.lookup_operands(&flow_id, &identifier).await {
            Ok((None, None)) => entry,
            Ok((first, second)) => {
                let mut entry = entry;
                if let Value::Object(params) = &mut entry.parameters {
                    params.insert(RESOLVED_FIRST_KEY.to_string(), first.map(Value::String).unwrap_or(Value::Null));
                    params.insert(RESOLVED_SECOND_KEY.to_string(), second.map(Value::String).unwrap_or(Value::Null));
                }
                entry
            }
            Err(e) => {
                tracing::debug!(
                    flow_id = %flow_id,
                    identifier = %identifier,
                    error = %e,
                    "Comparison lookup failed, keeping entry unenriched"
                );
                entry
            }
        }
    }

    /// Enrich a sequence concurrently, preserving order
    pub async fn enrich_all(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        let futures: Vec<_> = entries.into_iter().map(|e| self.enrich(e)).collect();
        futures::future::join_all(futures).await
    }

    async fn lookup_operands(
        &self,
        flow_id: &str,
        identifier: &str,
    ) -> BackendResult<(Option<String>, Option<String>)> {
        let first = self
            .source
            .get_comparison_value(flow_id, identifier, COMPARISON_VALUE_FIELD, false)
            .await?;
        let second = self
            .source
            .get_comparison_value(flow_id, identifier, COMPARISON_VALUE_FIELD, true)
            .await?;
        Ok((first, second))
    }
}

/// Resolves comparison operands from already-fetched flow content documents.
///
/// Documents use the contact-flow language layout: an `Actions` array whose
/// items carry an `Identifier`, a `Parameters` object (first operand) and
/// `Transitions.Conditions[0].Condition.Operands[0]` (second operand).
#[derive(Debug, Clone, Default)]
pub struct FlowContentSource {
    flows: HashMap<String, Value>,
}

impl FlowContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed flow content document
    pub fn with_flow(mut self, flow_id: impl Into<String>, content: Value) -> Self {
        self.flows.insert(flow_id.into(), content);
        self
    }

    /// Register a flow content document given as JSON text
    pub fn add_flow_json(&mut self, flow_id: impl Into<String>, content: &str) -> BackendResult<()> {
        let parsed: Value =
            serde_json::from_str(content).map_err(|e| BackendError::Parse(e.to_string()))?;
        self.flows.insert(flow_id.into(), parsed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    fn action(&self, flow_id: &str, identifier: &str) -> BackendResult<&Value> {
        let flow = self
            .flows
            .get(flow_id)
            .ok_or_else(|| BackendError::NotFound(format!("flow {}", flow_id)))?;

        flow.get("Actions")
            .and_then(Value::as_array)
            .and_then(|actions| {
                actions
                    .iter()
                    .find(|a| a.get("Identifier").and_then(Value::as_str) == Some(identifier))
            })
            .ok_or_else(|| BackendError::NotFound(format!("action {} in flow {}", identifier, flow_id)))
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait::async_trait]
impl FlowDefinitionSource for FlowContentSource {
    async fn get_comparison_value(
        &self,
        flow_id: &str,
        identifier: &str,
        field: &str,
        is_second_operand: bool,
    ) -> BackendResult<Option<String>> {
        let action = self.action(flow_id, identifier)?;

        let value = if is_second_operand {
            action
                .pointer("/Transitions/Conditions/0/Condition/Operands/0")
                .and_then(as_text)
        } else {
            action
                .get("Parameters")
                .and_then(|p| p.get(field))
                .and_then(as_text)
        };
        Ok(value)
    }
}
