//! HTTP handler
//!
//! Routes:
//! - `GET /health`
//! - `POST /api/v1/contacts/graph` - execution graph of one contact
//! - `POST /api/v1/contacts/search` - month-bucketed search over one partition
//! - `GET /api/v1/traces/:trace_id` - analysis of one distributed trace

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use flowtrace_core::{
    BackendError, ContactTrace, ContactTraceRequest, ContactTracer, FlowTraceError, ResultRow,
    TraceAnalysis,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::client::{FlowGatewayClient, GatewayClient, LogGatewayClient, TraceGatewayClient};
use crate::config::{ConfigError, ServerConfig};

/// Application state
pub struct AppState {
    pub tracer: ContactTracer,
    pub started: Instant,
}

impl AppState {
    pub fn new(tracer: ContactTracer) -> Self {
        Self {
            tracer,
            started: Instant::now(),
        }
    }

    /// Build gateway clients from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let gateway = |url: &str| {
            GatewayClient::new(url)
                .map(|g| g.with_timeout(config.request_timeout()))
                .map_err(|e| ConfigError::Invalid(e.to_string()))
        };

        let logs = LogGatewayClient::new(gateway(&config.log_query_url)?);
        let mut tracer = ContactTracer::new(config.tracer.clone(), Arc::new(logs));

        if let Some(url) = &config.flow_definition_url {
            tracer = tracer.with_flow_source(Arc::new(FlowGatewayClient::new(gateway(url)?)));
        }
        if let Some(url) = &config.trace_url {
            tracer = tracer.with_trace_source(Arc::new(TraceGatewayClient::new(gateway(url)?)));
        }

        Ok(Self::new(tracer))
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/contacts/graph", post(contact_graph))
        .route("/api/v1/contacts/search", post(search_contacts))
        .route("/api/v1/traces/:trace_id", get(trace_analysis))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiError>)>;

fn error_response(err: FlowTraceError, request_id: Uuid) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &err {
        e if e.is_user_error() => (StatusCode::BAD_REQUEST, "InvalidInput"),
        FlowTraceError::Backend(BackendError::NotFound(_)) => (StatusCode::NOT_FOUND, "NotFound"),
        FlowTraceError::Backend(BackendError::Unavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "Unavailable")
        }
        _ => (StatusCode::BAD_GATEWAY, "UpstreamError"),
    };

    if status.is_server_error() {
        tracing::error!(request_id = %request_id, error = %err, "Request failed");
    } else {
        tracing::debug!(request_id = %request_id, error = %err, "Request rejected");
    }

    (
        status,
        Json(ApiError {
            error: code.to_string(),
            message: err.to_string(),
            request_id: Some(request_id),
        }),
    )
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "flowtrace".to_string(),
        version: flowtrace_core::VERSION.to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

/// Build the execution graph of one contact
async fn contact_graph(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContactTraceRequest>,
) -> ApiResult<ContactTrace> {
    let request_id = Uuid::new_v4();

    let trace = state
        .tracer
        .trace_contact(&request)
        .await
        .map_err(|e| error_response(e, request_id))?;

    Ok(Json(ApiResponse {
        success: true,
        data: trace,
        request_id,
    }))
}

/// Search one partition month by month
async fn search_contacts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let request_id = Uuid::new_v4();

    if request.partition.is_empty() || request.query.is_empty() {
        return Err(error_response(
            FlowTraceError::invalid_input("partition and query must be set"),
            request_id,
        ));
    }

    let rows = state
        .tracer
        .search(&request.partition, &request.query, request.start_date, request.end_date)
        .await
        .map_err(|e| error_response(e, request_id))?;

    Ok(Json(ApiResponse {
        success: true,
        data: SearchResponse {
            count: rows.len(),
            rows,
        },
        request_id,
    }))
}

/// Analyse one distributed trace
async fn trace_analysis(
    State(state): State<Arc<AppState>>,
    Path(trace_id): Path<String>,
) -> ApiResult<TraceAnalysis> {
    let request_id = Uuid::new_v4();

    let analysis = state
        .tracer
        .analyze_traces(std::slice::from_ref(&trace_id))
        .await
        .map_err(|e| error_response(e, request_id))?
        .into_iter()
        .find(|a| a.trace_id == trace_id)
        .ok_or_else(|| {
            error_response(
                BackendError::NotFound(format!("trace {}", trace_id)).into(),
                request_id,
            )
        })?;

    Ok(Json(ApiResponse {
        success: true,
        data: analysis,
        request_id,
    }))
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Search request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub partition: String,
    pub query: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub rows: Vec<ResultRow>,
    pub count: usize,
}

/// API response wrapper
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub request_id: Uuid,
}

/// API error
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub request_id: Option<Uuid>,
}
