use clap::Parser;
use client::network::Client;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = shared::default_addr())]
    server: String,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);

    let result = match Client::connect(&args.server).await {
        Ok(client) => client.run().await,
        Err(e) => Err(e),
    };

    // Exit explicitly, a pending stdin read would otherwise keep the runtime alive
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            error!("Client error: {}", e);
            eprintln!("Error: {}", e);
            1
        }
    };
    std::process::exit(code);
}
