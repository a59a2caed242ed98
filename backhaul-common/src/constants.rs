//! Default ports and addresses for Backhaul services.
//!
//! Use these constants instead of magic numbers so defaults stay consistent
//! across the main library, CLI, and tests.

/// Default port for the control plane (the tunnel client connects here).
pub const DEFAULT_CONTROL_PORT: u16 = 7845;

/// Default port for HTTP ingress (public traffic to the tunneled service).
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address for the control plane as a string (`0.0.0.0:7845`).
pub const DEFAULT_CONTROL_BIND: &str = "0.0.0.0:7845";

/// Default bind address for HTTP ingress as a string (`0.0.0.0:8080`).
pub const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8080";

/// Default local address the client forwards to (`127.0.0.1:3000`).
pub const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1:3000";

/// Status code synthesized when the local service cannot be reached.
pub const STATUS_GATEWAY_TIMEOUT: u16 = 504;
