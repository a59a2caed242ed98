//! Backhaul unified CLI
//!
//! Reverse HTTP tunnel: expose a local service through a public server.

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "backhaul",
    author,
    version,
    about = "Reverse HTTP tunnel for exposing local services",
    long_about = "Backhaul relays public HTTP requests over a single control\n\
                  connection to a client running next to your local service.\n\n\
                  Run `backhaul server` on a public host and `backhaul client`\n\
                  next to the service you want to expose.",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tunnel server
    Server(commands::server::ServerArgs),

    /// Run the tunnel client
    Client(commands::client::ClientArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => commands::server::run(args).await,
        Commands::Client(args) => commands::client::run(args).await,
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
