//! studiod - AI image studio server daemon

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use studiod::{Config, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AI image studio server daemon
#[derive(Parser, Debug)]
#[command(name = "studiod", version, about = "AI image studio server daemon")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// SQLite database path (in-memory when omitted)
    #[arg(long)]
    database: Option<String>,

    /// Configuration file path
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studiod=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load config, then apply CLI overrides
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database = Some(database);
    }

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
