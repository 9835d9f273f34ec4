//! Parley signaling server.
//!
//! Relays pipe-delimited frames between WebSocket clients, either to every
//! connection (`global`) or to the members of one meeting room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin parley-server
//! cargo run --bin parley-server -- --host 127.0.0.1 --port 9000
//! ```

use parley_server::ui::{DEFAULT_PORT, DEFAULT_PORT_ATTEMPTS, Server, ServerConfig};
use parley_shared::logger::setup_logger;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Room-scoped WebSocket signaling server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// First port to try; busy ports are skipped
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// How many consecutive ports to try before giving up
    #[arg(long, default_value_t = DEFAULT_PORT_ATTEMPTS)]
    port_attempts: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        port_attempts: args.port_attempts,
    };

    let bound = match Server::in_memory().bind(&config).await {
        Ok(bound) => bound,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Press Ctrl+C to shutdown gracefully");
    if let Err(e) = bound.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
