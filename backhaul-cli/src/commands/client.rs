//! Client subcommand implementation

use anyhow::{Context, Result};
use backhaul_common::init_logging;
use backhaul_core::TunnelClient;
use backhaul_http::HttpForwarder;
use clap::Args;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Server control address (host:port)
    #[arg(long, env = "BACKHAUL_SERVER")]
    server: String,

    /// Local service address to forward to (host:port)
    #[arg(long, default_value = "127.0.0.1:3000", env = "BACKHAUL_LOCAL_ADDR")]
    local_addr: String,

    /// Maximum concurrently in-flight forwards
    #[arg(long, default_value_t = 64, env = "BACKHAUL_MAX_INFLIGHT")]
    max_inflight: usize,

    /// Seconds to wait for the TCP connect to the local service
    #[arg(long, default_value_t = 5, env = "BACKHAUL_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

pub async fn run(args: ClientArgs) -> Result<()> {
    init_logging(&args.log_level);

    info!("Starting Backhaul client v{}", env!("CARGO_PKG_VERSION"));
    info!("  server: {}", args.server);
    info!("  forwarding to: {}", args.local_addr);

    let forwarder = HttpForwarder::new(args.local_addr)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout_secs));
    let client = TunnelClient::new(args.server).with_max_inflight(args.max_inflight);

    // The client serves until the control connection is lost; there is no
    // automatic reconnect, so the terminal error reaches the exit code.
    client
        .run(forwarder)
        .await
        .context("tunnel client terminated")
}
