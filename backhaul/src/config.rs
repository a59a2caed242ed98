//! Configuration types for embedding the Backhaul client and server.

use backhaul_common::config::{LimitsConfig, TimeoutConfig};
use backhaul_common::{
    Result, TunnelError, DEFAULT_CONTROL_PORT, DEFAULT_HTTP_PORT, DEFAULT_LOCAL_ADDR,
};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the tunnel server.
///
/// Use [`ServerBuilder`](crate::ServerBuilder) for ergonomic construction.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the control plane (tunnel clients connect here)
    pub control_bind: SocketAddr,

    /// Address to bind the public HTTP ingress
    pub http_bind: SocketAddr,

    /// How long a public request may wait for its tunneled response
    pub request_timeout: Duration,

    /// Resource limits (body size, queue depths, connection cap)
    pub limits: LimitsConfig,
}

impl ServerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.control_bind == self.http_bind {
            return Err(TunnelError::Config(
                "control and HTTP ingress cannot share a bind address".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            control_bind: ([0, 0, 0, 0], DEFAULT_CONTROL_PORT).into(),
            http_bind: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            request_timeout: TimeoutConfig::default().request_timeout,
            limits: LimitsConfig::default(),
        }
    }
}

/// Configuration for the tunnel client.
///
/// Use [`ClientBuilder`](crate::ClientBuilder) for ergonomic construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server control address to connect to (host:port)
    pub server_addr: String,

    /// Local address to forward traffic to
    pub local_addr: String,

    /// Bound on concurrently in-flight forwards
    pub max_inflight: usize,

    /// Deadline for the TCP connect to the local service
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server_addr.is_empty() {
            return Err(TunnelError::Config("server_addr is required".into()));
        }
        if self.local_addr.is_empty() {
            return Err(TunnelError::Config("local_addr is required".into()));
        }
        if self.max_inflight == 0 {
            return Err(TunnelError::Config("max_inflight must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            local_addr: DEFAULT_LOCAL_ADDR.to_string(),
            max_inflight: LimitsConfig::default().max_inflight_forwards,
            connect_timeout: TimeoutConfig::default().connect_timeout,
        }
    }
}
