use anyhow::Result;
use clap::Parser;
use dfs_naming_daemon::config::load_config;
use dfs_naming_daemon::server::NamingServer;
use dfs_naming_daemon::tcp_coordinator;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address both listeners bind to
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port of the client-facing service listener
    #[arg(long, default_value_t = 8080)]
    service_port: u16,

    /// Port storage nodes register on
    #[arg(long, default_value_t = 8090)]
    registration_port: u16,

    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Starting distributed file store naming server");

    let config = load_config(args.config.as_deref())?;
    info!(?config, "Loaded configuration");

    let naming = Arc::new(tcp_coordinator(config));
    let mut server = NamingServer::bind(
        naming,
        SocketAddr::new(args.bind, args.service_port),
        SocketAddr::new(args.bind, args.registration_port),
    )
    .await?;

    // Set up signal handlers for graceful shutdown
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
            server.shutdown().await?;
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
            server.shutdown().await?;
        }
    }

    Ok(())
}
