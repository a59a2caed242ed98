//! # Backhaul
//!
//! A reverse HTTP tunnel: expose a service running on localhost through a
//! public server you control.
//!
//! A public-facing [`Server`] accepts ordinary HTTP requests and relays
//! them over one long-lived control connection to a [`Client`] running
//! next to the local service; the client forwards each request locally and
//! relays the response back. Requests are multiplexed over the single
//! connection and matched to responses by correlation ID, so one slow
//! request never blocks the others.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use backhaul::{Client, Server};
//!
//! # async fn example() -> backhaul::Result<()> {
//! let mut server = Server::builder()
//!     .bind("0.0.0.0:7845".parse().unwrap())
//!     .http_bind("0.0.0.0:8080".parse().unwrap())
//!     .build()?;
//!
//! // On the machine with the local service:
//! let mut client = Client::builder()
//!     .server_addr("tunnel.example.com:7845")
//!     .local_addr("127.0.0.1:3000")
//!     .build()?;
//!
//! client.start().await?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Backhaul consists of several crates:
//!
//! - `backhaul-protocol` - wire frames and codecs
//! - `backhaul-common` - shared errors, config, and logging
//! - `backhaul-core` - waiter table, tunnel server and client
//! - `backhaul-http` - hyper-based ingress and local forwarding

mod client;
mod config;
mod server;

// Re-export subcrates
pub use backhaul_common as common;
pub use backhaul_protocol as protocol;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::{Result, TunnelError};
    pub use crate::protocol::{RequestFrame, ResponseFrame};
    pub use crate::{Client, ClientBuilder, Server, ServerBuilder};
}

// Convenience re-exports at crate root
pub use client::{Client, ClientBuilder};
pub use common::{Result, TunnelError};
pub use config::{ClientConfig, ServerConfig};
pub use protocol::{RequestCodec, RequestFrame, ResponseCodec, ResponseFrame};
pub use server::{Server, ServerBuilder};
