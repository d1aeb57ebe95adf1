use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use colloquy_client::HttpAgentClient;
use colloquy_core::client::AgentRegistry;
use colloquy_engine::{spawn_refresh_task, AgentDirectory, ConversationOrchestrator, RunnerConfig};
use colloquy_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "colloquy", about = "Multi-agent relay conversation server")]
struct Args {
    /// Port to serve the HTTP API on.
    #[arg(long, default_value_t = 9190)]
    port: u16,

    /// Base URL of the agent backend.
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    backend_url: String,

    /// Roster refresh cadence in seconds.
    #[arg(long, default_value_t = 5)]
    refresh_interval_secs: u64,

    /// Pacing delay between agent turns in milliseconds.
    #[arg(long, default_value_t = 1000)]
    turn_delay_ms: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let telemetry = TelemetryConfig {
        json_output: args.json_logs,
        ..Default::default()
    };
    init_telemetry(&telemetry);

    tracing::info!(backend = %args.backend_url, "starting colloquy server");

    let client = Arc::new(
        HttpAgentClient::new(&args.backend_url).expect("failed to build HTTP client"),
    );

    let directory = Arc::new(AgentDirectory::new());
    let shutdown = CancellationToken::new();
    let registry: Arc<dyn AgentRegistry> = client.clone();
    let _refresh = spawn_refresh_task(
        Arc::clone(&directory),
        registry,
        Duration::from_secs(args.refresh_interval_secs),
        shutdown.clone(),
    );

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        client,
        directory,
        RunnerConfig {
            turn_delay: Duration::from_millis(args.turn_delay_ms),
        },
    ));

    let config = colloquy_server::ServerConfig { port: args.port };
    let handle = colloquy_server::start(config, orchestrator)
        .await
        .expect("failed to start server");

    tracing::info!(port = handle.port, "colloquy server ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
    shutdown.cancel();
}
