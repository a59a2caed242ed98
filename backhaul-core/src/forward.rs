//! Forwarder seam between the tunnel client and the local HTTP stack
//!
//! The core client knows nothing about HTTP execution; it hands each
//! decoded request to a [`Forwarder`] and wraps whatever comes back into a
//! response frame. `backhaul-http` provides the hyper-backed
//! implementation.

use async_trait::async_trait;
use backhaul_common::Result;
use backhaul_protocol::Headers;
use bytes::Bytes;

/// A request to execute against the local service.
///
/// Correlation IDs stay in the core; the forwarder only sees the HTTP
/// parts.
#[derive(Debug, Clone)]
pub struct LocalRequest {
    pub method: String,
    /// Path including any query string.
    pub path: String,
    pub headers: Headers,
    pub body: Bytes,
}

/// A fully-buffered response from the local service.
#[derive(Debug, Clone)]
pub struct LocalResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

/// Executes tunneled requests against the local service.
#[async_trait]
pub trait Forwarder: Send + Sync + 'static {
    /// Execute `request` and return the buffered response.
    ///
    /// Transport failures (unreachable service, connect/read timeout)
    /// surface as `Err`; the caller synthesizes the 504 reply, so
    /// implementations never fabricate statuses for their own failures.
    async fn forward(&self, request: LocalRequest) -> Result<LocalResponse>;
}
