//! Flow definition gateway client.

use super::GatewayClient;
use async_trait::async_trait;
use flowtrace_core::{BackendError, BackendResult, FlowDefinitionSource};
use serde::Deserialize;

/// `FlowDefinitionSource` over
/// `GET {base}/flows/{flowId}/actions/{identifier}/{field}?second=bool`.
///
/// A 404 means the block or field does not exist and maps to `Ok(None)`.
#[derive(Debug, Clone)]
pub struct FlowGatewayClient {
    gateway: GatewayClient,
}

impl FlowGatewayClient {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[derive(Debug, Deserialize)]
struct ComparisonValueResponse {
    #[serde(default)]
    value: Option<String>,
}

#[async_trait]
impl FlowDefinitionSource for FlowGatewayClient {
    async fn get_comparison_value(
        &self,
        flow_id: &str,
        identifier: &str,
        field: &str,
        is_second_operand: bool,
    ) -> BackendResult<Option<String>> {
        let mut url = self
            .gateway
            .url(&["flows", flow_id, "actions", identifier, field])?;
        url.query_pairs_mut()
            .append_pair("second", if is_second_operand { "true" } else { "false" });

        match self
            .gateway
            .send_json::<ComparisonValueResponse>(self.gateway.get(url))
            .await
        {
            Ok(response) => Ok(response.value),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
