//! flowtrace server
//!
//! HTTP implementations of the engine's backend traits, the REST handler
//! that serves execution graphs and trace analyses, and the process-level
//! configuration and logging setup used by the `flowtrace` binary.

pub mod client;
pub mod config;
pub mod handler;
pub mod telemetry;

pub use client::{FlowGatewayClient, GatewayClient, LogGatewayClient, TraceGatewayClient};
pub use config::{ConfigError, ServerConfig};
pub use handler::{create_router, AppState};
pub use telemetry::{init_tracing, LogFormat};
