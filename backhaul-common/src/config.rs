//! Configuration types shared by the Backhaul server and client

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadlines for tunnel operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// How long a public request may wait for its tunneled response
    pub request_timeout: Duration,
    /// Deadline for the client's TCP connect to the local service
    pub connect_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Resource limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum request/response body size relayed through the tunnel
    pub max_body_bytes: u32,
    /// Maximum in-flight forwards on the client before intake waits
    pub max_inflight_forwards: usize,
    /// Maximum concurrent public HTTP connections on the ingress
    pub max_http_connections: usize,
    /// Depth of the per-connection frame write queue
    pub write_queue_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024, // 16MB
            max_inflight_forwards: 64,
            max_http_connections: 10_000,
            write_queue_depth: 1024,
        }
    }
}
