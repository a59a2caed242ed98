//! Embeddable tunnel server with builder pattern.
//!
//! # Example
//!
//! ```rust,no_run
//! use backhaul::Server;
//!
//! # async fn example() -> backhaul::Result<()> {
//! let mut server = Server::builder()
//!     .bind("0.0.0.0:7845".parse().unwrap())
//!     .http_bind("0.0.0.0:8080".parse().unwrap())
//!     .build()?;
//!
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ServerConfig;
use backhaul_common::config::LimitsConfig;
use backhaul_common::{Result, TunnelError};
use backhaul_core::TunnelServer;
use backhaul_http::{HttpIngress, IngressConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// A tunnel server that can be embedded in your application.
///
/// Use [`Server::builder()`] to create a new server with the builder
/// pattern. [`start()`](Self::start) runs until [`stop()`](Self::stop) is
/// called or one of the underlying listeners fails.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    shutdown_tx: Option<watch::Sender<bool>>,
}

/// Builder for constructing a [`Server`] with ergonomic configuration.
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Run the control listener and HTTP ingress.
    ///
    /// Blocks until [`stop()`](Self::stop) is called or either listener
    /// exits with an error. Failure to bind the control port is fatal and
    /// propagates.
    pub async fn start(&mut self) -> Result<()> {
        if self.shutdown_tx.is_some() {
            return Err(TunnelError::InvalidState("server already started".into()));
        }

        let config = self.config.clone();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting Backhaul server");
        info!("  control bind: {}", config.control_bind);
        info!("  HTTP bind: {}", config.http_bind);

        let tunnel_server = TunnelServer::new(config.control_bind)
            .with_request_timeout(config.request_timeout)
            .with_limits(config.limits.clone());
        let state = tunnel_server.state();

        let ingress = HttpIngress::with_config(
            config.http_bind,
            state,
            IngressConfig {
                max_connections: config.limits.max_http_connections,
                max_body_bytes: config.limits.max_body_bytes as usize,
            },
        );

        let mut control_handle = tokio::spawn(tunnel_server.run());
        let mut ingress_handle = tokio::spawn(ingress.start());

        let outcome = tokio::select! {
            result = &mut control_handle => match result {
                Ok(inner) => inner,
                Err(e) => Err(TunnelError::Connection(format!("control task panicked: {e}"))),
            },
            result = &mut ingress_handle => match result {
                Ok(inner) => inner,
                Err(e) => Err(TunnelError::Connection(format!("ingress task panicked: {e}"))),
            },
            _ = shutdown_rx.changed() => {
                info!("server shutdown requested");
                Ok(())
            }
        };

        control_handle.abort();
        ingress_handle.abort();
        outcome
    }

    /// Signal the server to stop (non-blocking).
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

impl ServerBuilder {
    /// Address for the control plane listener.
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.control_bind = addr;
        self
    }

    /// Address for the public HTTP ingress.
    #[must_use]
    pub fn http_bind(mut self, addr: SocketAddr) -> Self {
        self.config.http_bind = addr;
        self
    }

    /// Deadline for a public request's tunneled response.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Resource limits (body size, queue depths, connection cap).
    #[must_use]
    pub fn limits(mut self, limits: LimitsConfig) -> Self {
        self.config.limits = limits;
        self
    }

    /// Validate the configuration and construct the server.
    pub fn build(self) -> Result<Server> {
        self.config.validate()?;
        Ok(Server {
            config: self.config,
            shutdown_tx: None,
        })
    }
}
