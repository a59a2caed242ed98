//! Embeddable tunnel client with builder pattern.
//!
//! # Example
//!
//! ```rust,no_run
//! use backhaul::Client;
//!
//! # async fn example() -> backhaul::Result<()> {
//! let mut client = Client::builder()
//!     .server_addr("tunnel.example.com:7845")
//!     .local_addr("127.0.0.1:3000")
//!     .build()?;
//!
//! client.start().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use backhaul_common::{Result, TunnelError};
use backhaul_core::TunnelClient;
use backhaul_http::HttpForwarder;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A tunnel client that can be embedded in your application.
///
/// Use [`Client::builder()`] to create a new client with the builder
/// pattern. [`start()`](Self::start) dials the server and then serves in a
/// background task until the control connection is lost or
/// [`shutdown()`](Self::shutdown) is called. The client does not
/// reconnect; when the connection drops the background task finishes with
/// the terminal error.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    task: Option<JoinHandle<Result<()>>>,
}

/// Builder for constructing a [`Client`] with ergonomic configuration.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Dial the server and start serving tunneled requests.
    ///
    /// Connection errors surface here; after a successful dial the client
    /// keeps serving in the background.
    pub async fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(TunnelError::InvalidState("client already started".into()));
        }

        let config = self.config.clone();
        let stream = TcpStream::connect(&config.server_addr)
            .await
            .map_err(|e| {
                TunnelError::Connection(format!("connecting to {}: {e}", config.server_addr))
            })?;
        info!("connected to {}, tunnel open", config.server_addr);

        let forwarder = HttpForwarder::new(config.local_addr.clone())
            .with_connect_timeout(config.connect_timeout);
        let tunnel =
            TunnelClient::new(config.server_addr.clone()).with_max_inflight(config.max_inflight);

        let task = tokio::spawn(async move {
            let result = tunnel.run_on(stream, forwarder).await;
            if let Err(ref e) = result {
                error!("tunnel client terminated: {e}");
            }
            result
        });
        self.task = Some(task);

        Ok(())
    }

    /// Stop serving and wait for the background task to wind down.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        Ok(())
    }

    /// Whether the background task is still serving.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl ClientBuilder {
    /// Server control address to connect to (host:port).
    #[must_use]
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Local address to forward traffic to (host:port).
    #[must_use]
    pub fn local_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.local_addr = addr.into();
        self
    }

    /// Bound on concurrently in-flight forwards.
    #[must_use]
    pub fn max_inflight(mut self, max_inflight: usize) -> Self {
        self.config.max_inflight = max_inflight;
        self
    }

    /// Deadline for the TCP connect to the local service.
    #[must_use]
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = connect_timeout;
        self
    }

    /// Validate the configuration and construct the client.
    pub fn build(self) -> Result<Client> {
        self.config.validate()?;
        Ok(Client {
            config: self.config,
            task: None,
        })
    }
}
