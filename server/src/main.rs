use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::map::load_map;
use server::network::{Server, ServerError};
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = shared::DEFAULT_HOST)]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Length of one world tick in milliseconds
    #[clap(short, long, default_value_t = 1000)]
    tick_ms: u64,
    /// Maximum number of connected players
    #[clap(short, long, default_value_t = 64)]
    max_clients: usize,
    /// Queued actions before sessions have to wait
    #[clap(long, default_value_t = 1024)]
    inbox_capacity: usize,
    /// JSON map file; the built-in two-room map is used without it
    #[clap(long)]
    map: Option<PathBuf>,
}

/// Parses the command line, loads the map and runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = ServerConfig {
        host: args.host,
        port: args.port,
        tick: Duration::from_millis(args.tick_ms.max(1)),
        max_clients: args.max_clients,
        inbox_capacity: args.inbox_capacity,
        ..ServerConfig::default()
    };

    if let Some(path) = args.map {
        config.rooms = load_map(&path).map_err(|e| {
            error!("Failed to load map {}: {}", path.display(), e);
            e
        })?;
        info!("Loaded {} rooms from {}", config.rooms.len(), path.display());
    }

    info!("Starting MUD server on {}", config.addr());

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!("Server error: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
