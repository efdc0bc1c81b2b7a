//! Trace gateway client.

use super::GatewayClient;
use async_trait::async_trait;
use flowtrace_core::{BackendResult, TraceBatch, TraceSource};
use serde::Serialize;

/// `TraceSource` over `POST {base}/traces/batch`
#[derive(Debug, Clone)]
pub struct TraceGatewayClient {
    gateway: GatewayClient,
}

impl TraceGatewayClient {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetTracesRequest<'a> {
    trace_ids: &'a [String],
}

#[async_trait]
impl TraceSource for TraceGatewayClient {
    async fn batch_get_traces(&self, trace_ids: &[String]) -> BackendResult<TraceBatch> {
        let url = self.gateway.url(&["traces", "batch"])?;
        let body = BatchGetTracesRequest { trace_ids };
        self.gateway.send_json(self.gateway.post(url).json(&body)).await
    }
}
