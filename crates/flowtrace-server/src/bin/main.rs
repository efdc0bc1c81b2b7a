//! flowtrace entry point
//!
//! Serves execution graphs over HTTP, or runs the pure stages offline on
//! exported query rows and trace batches.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use flowtrace_core::{
    build_graph, month_windows, normalize_rows, parse_batch, ContactTraceRequest, LayoutConfig,
    ResultRow, TraceBatch,
};
use flowtrace_server::{create_router, init_tracing, AppState, LogFormat, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flowtrace")]
#[command(about = "Contact flow execution tracing")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "json", env = "FLOWTRACE_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to server config file (JSON/YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Trace one contact through the configured gateways
    Contact {
        /// Contact id
        contact_id: String,

        /// Window start, epoch seconds
        #[arg(long)]
        start: i64,

        /// Window end, epoch seconds
        #[arg(long)]
        end: i64,

        /// Path to server config file (JSON/YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Build a graph from exported query rows
    Graph {
        /// JSON file holding an array of rows (`[{field, value}, ...]`)
        #[arg(short, long)]
        rows: PathBuf,

        /// Nodes per layout row
        #[arg(long, default_value = "5")]
        columns: usize,
    },

    /// Analyse a trace batch file
    Trace {
        /// JSON file in `{"Traces": [...]}` form
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the month windows a date-range search would query
    Months {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Serve { config, port, host } => {
            let mut config = ServerConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }

            let addr = config.bind_addr()?;
            let state = Arc::new(AppState::from_config(&config)?);
            let router = create_router(state);

            tracing::info!(
                addr = %addr,
                version = flowtrace_core::VERSION,
                log_groups = config.tracer.log_groups.len(),
                enrich = config.flow_definition_url.is_some(),
                traces = config.trace_url.is_some(),
                "Starting flowtrace server"
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Contact {
            contact_id,
            start,
            end,
            config,
        } => {
            let config = ServerConfig::load(config.as_deref())?;
            let state = AppState::from_config(&config)?;

            let request = ContactTraceRequest::new(contact_id, start, end);
            let trace = state.tracer.trace_contact(&request).await?;
            println!("{}", serde_json::to_string_pretty(&trace)?);
        }

        Commands::Graph { rows, columns } => {
            let content = std::fs::read_to_string(&rows)
                .with_context(|| format!("reading {}", rows.display()))?;
            let rows: Vec<ResultRow> = serde_json::from_str(&content)?;

            let layout = LayoutConfig {
                columns,
                ..Default::default()
            };
            let graph = build_graph(normalize_rows(&rows), &layout)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);

            if graph.error_count() > 0 {
                tracing::warn!(errors = graph.error_count(), "Graph contains failed steps");
            }
        }

        Commands::Trace { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let batch = TraceBatch::from_json(&content)?;
            let analyses = parse_batch(&batch);
            println!("{}", serde_json::to_string_pretty(&analyses)?);
        }

        Commands::Months { start, end } => {
            let windows = month_windows(start, end);
            println!("{}", serde_json::to_string_pretty(&windows)?);
        }
    }

    Ok(())
}
