//! Server subcommand implementation

use anyhow::{Context, Result};
use backhaul_common::init_logging;
use backhaul_core::TunnelServer;
use backhaul_http::HttpIngress;
use clap::Args;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the control plane (tunnel clients connect here)
    #[arg(long, default_value = "0.0.0.0:7845", env = "BACKHAUL_BIND")]
    bind: SocketAddr,

    /// Address to bind the public HTTP ingress
    #[arg(long, default_value = "0.0.0.0:8080", env = "BACKHAUL_HTTP_BIND")]
    http_bind: SocketAddr,

    /// Seconds a public request may wait for its tunneled response
    #[arg(long, default_value_t = 30, env = "BACKHAUL_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

pub async fn run(args: ServerArgs) -> Result<()> {
    init_logging(&args.log_level);

    info!("Starting Backhaul server v{}", env!("CARGO_PKG_VERSION"));

    let server = TunnelServer::new(args.bind)
        .with_request_timeout(Duration::from_secs(args.request_timeout_secs));
    let state = server.state();
    let ingress = HttpIngress::new(args.http_bind, state);

    let control_handle = tokio::spawn(server.run());
    let ingress_handle = tokio::spawn(ingress.start());

    // Either listener exiting takes the whole server down; bind failures
    // surface here.
    tokio::select! {
        result = control_handle => result
            .context("control task panicked")?
            .context("control listener failed"),
        result = ingress_handle => result
            .context("ingress task panicked")?
            .context("HTTP ingress failed"),
    }
}
