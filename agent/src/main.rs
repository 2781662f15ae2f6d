//! Entry point for the delegatio control agent.

use clap::Parser;
use delegatio_agent::GuestAgent;
use delegatio_shared::constants::agent;
use delegatio_shared::DelegatioResult;
use tracing::info;

/// Delegatio Agent - runs inside every cluster node
#[derive(Parser, Debug)]
#[command(author, version, about = "Delegatio Agent - node-side control agent")]
struct AgentArgs {
    /// Listen URI for host communication
    ///
    /// Examples:
    ///   --listen tcp://0.0.0.0:9000
    ///   --listen unix:///run/delegatio/agent.sock
    #[arg(short, long, default_value = agent::DEFAULT_LISTEN)]
    listen: String,
}

#[tokio::main]
async fn main() -> DelegatioResult<()> {
    // Respects RUST_LOG, defaults to "info"
    if let Err(e) = tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
    {
        eprintln!("[ERROR] Failed to initialize tracing: {}", e);
    }

    let args = AgentArgs::parse();
    info!(listen = %args.listen, "delegatio agent starting");

    GuestAgent::new().run(&args.listen).await
}
