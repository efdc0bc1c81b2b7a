//! Log query gateway client.

use super::GatewayClient;
use async_trait::async_trait;
use flowtrace_core::{BackendResult, LogQueryBackend, QueryResults, QueryStatus, ResultRow};
use serde::{Deserialize, Serialize};

/// `LogQueryBackend` over `POST {base}/queries` and `GET {base}/queries/{id}`
#[derive(Debug, Clone)]
pub struct LogGatewayClient {
    gateway: GatewayClient,
}

impl LogGatewayClient {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartQueryRequest<'a> {
    log_group_name: &'a str,
    query_string: &'a str,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartQueryResponse {
    query_id: String,
}

#[derive(Debug, Deserialize)]
struct GetQueryResultsResponse {
    status: QueryStatus,
    #[serde(default)]
    results: Vec<ResultRow>,
}

#[async_trait]
impl LogQueryBackend for LogGatewayClient {
    async fn submit_query(
        &self,
        partition: &str,
        query: &str,
        start_epoch: i64,
        end_epoch: i64,
    ) -> BackendResult<String> {
        let url = self.gateway.url(&["queries"])?;
        let body = StartQueryRequest {
            log_group_name: partition,
            query_string: query,
            start_time: start_epoch,
            end_time: end_epoch,
        };

        let response: StartQueryResponse = self.gateway.send_json(self.gateway.post(url).json(&body)).await?;
        tracing::debug!(partition = partition, query_id = %response.query_id, "Query started");
        Ok(response.query_id)
    }

    async fn get_query_results(&self, query_id: &str) -> BackendResult<QueryResults> {
        let url = self.gateway.url(&["queries", query_id])?;
        let response: GetQueryResultsResponse = self.gateway.send_json(self.gateway.get(url)).await?;

        Ok(QueryResults {
            status: response.status,
            rows: response.results,
        })
    }
}
