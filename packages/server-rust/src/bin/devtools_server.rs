use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use devtools_server::{NetworkConfig, NetworkModule, OperationRuntime, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Dev tools JSON-RPC server
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "DEVTOOLS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "DEVTOOLS_PORT", default_value_t = 8080)]
    port: u16,

    /// Custom operations definitions file (defaults to ./custom-operations.json if present)
    #[arg(long, env = "CUSTOM_OPERATIONS_LOCATION")]
    custom_operations_location: Option<PathBuf>,

    /// Per-operation timeout in milliseconds
    #[arg(long, env = "DEVTOOLS_OPERATION_TIMEOUT_MS", default_value_t = 30_000)]
    operation_timeout_ms: u64,

    /// Calls allowed in flight before new ones are rejected
    #[arg(long, env = "DEVTOOLS_MAX_CONCURRENT_OPERATIONS", default_value_t = 1000)]
    max_concurrent_operations: u32,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "DEVTOOLS_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Log output format
    #[arg(long, env = "DEVTOOLS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let runtime = Arc::new(OperationRuntime::new(ServerConfig {
        custom_operations_location: cli.custom_operations_location,
        default_operation_timeout_ms: cli.operation_timeout_ms,
        max_concurrent_operations: cli.max_concurrent_operations,
        ..ServerConfig::default()
    })?);

    // A broken definitions file disables custom operations; natives keep serving.
    if let Err(err) = runtime.start().await {
        error!(error = %format!("{err:#}"), "custom operations disabled");
    }

    let mut network = NetworkModule::new(
        NetworkConfig {
            host: cli.host,
            port: cli.port,
            cors_origins: cli.cors_origins,
            request_timeout: Duration::from_millis(cli.operation_timeout_ms.saturating_mul(2)),
            ..NetworkConfig::default()
        },
        Arc::clone(&runtime),
    );
    let port = network.start().await?;
    network.health().set_ready();
    info!(port, operations = runtime.registry().len(), "devtools server ready");

    network
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
        })
        .await?;

    runtime.shutdown(false).await?;
    info!("devtools server stopped");
    Ok(())
}
