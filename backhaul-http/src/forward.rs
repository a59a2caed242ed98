//! Local-service forwarder
//!
//! Executes a tunneled request against the configured local address over a
//! fresh HTTP/1.1 connection and buffers the full response. Every
//! transport failure maps to [`TunnelError::UpstreamUnavailable`]; the
//! tunnel client turns that into a synthetic 504.

use async_trait::async_trait;
use backhaul_common::config::TimeoutConfig;
use backhaul_common::{Result, TunnelError};
use backhaul_core::{Forwarder, LocalRequest, LocalResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{HeaderName, HeaderValue, HOST};
use hyper::{Method, Request, Uri};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Headers tied to a single hop. The tunnel re-frames bodies on both
/// sides, so these must not cross it.
pub(crate) fn is_hop_by_hop(name: &str) -> bool {
    name.eq_ignore_ascii_case("connection")
        || name.eq_ignore_ascii_case("keep-alive")
        || name.eq_ignore_ascii_case("proxy-connection")
        || name.eq_ignore_ascii_case("te")
        || name.eq_ignore_ascii_case("trailer")
        || name.eq_ignore_ascii_case("transfer-encoding")
        || name.eq_ignore_ascii_case("upgrade")
}

/// Hyper-backed [`Forwarder`] targeting one local address.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    local_addr: String,
    connect_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(local_addr: impl Into<String>) -> Self {
        Self {
            local_addr: local_addr.into(),
            connect_timeout: TimeoutConfig::default().connect_timeout,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Translate a tunneled request into a hyper request aimed at the
    /// local service: same method, path, headers, and body, with the host
    /// retargeted and per-hop headers stripped.
    fn build_local_request(&self, request: LocalRequest) -> Result<Request<Full<Bytes>>> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            TunnelError::UpstreamUnavailable(format!("invalid method {:?}: {e}", request.method))
        })?;
        let uri: Uri = request.path.parse().map_err(|e| {
            TunnelError::UpstreamUnavailable(format!("invalid path {:?}: {e}", request.path))
        })?;

        let mut local = Request::new(Full::new(request.body));
        *local.method_mut() = method;
        *local.uri_mut() = uri;

        for (name, value) in &request.headers {
            // Content-Length is recomputed from the buffered body.
            if is_hop_by_hop(name)
                || name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("host")
            {
                continue;
            }
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(n), Ok(v)) => {
                    local.headers_mut().append(n, v);
                }
                _ => warn!(%name, "skipping invalid forwarded header"),
            }
        }

        let host = HeaderValue::try_from(self.local_addr.as_str()).map_err(|e| {
            TunnelError::UpstreamUnavailable(format!(
                "invalid local address {:?}: {e}",
                self.local_addr
            ))
        })?;
        local.headers_mut().insert(HOST, host);

        Ok(local)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: LocalRequest) -> Result<LocalResponse> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.local_addr))
            .await
            .map_err(|_| {
                TunnelError::UpstreamUnavailable(format!(
                    "connect to {} timed out",
                    self.local_addr
                ))
            })?
            .map_err(|e| {
                TunnelError::UpstreamUnavailable(format!("connect to {}: {e}", self.local_addr))
            })?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await.map_err(|e| {
            TunnelError::UpstreamUnavailable(format!("handshake with {}: {e}", self.local_addr))
        })?;

        // Drive the connection until the exchange finishes; it is not
        // reused afterwards.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("local connection error: {e}");
            }
        });

        let local_request = self.build_local_request(request)?;
        let response = sender.send_request(local_request).await.map_err(|e| {
            TunnelError::UpstreamUnavailable(format!("request to {}: {e}", self.local_addr))
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| {
                TunnelError::UpstreamUnavailable(format!(
                    "reading response from {}: {e}",
                    self.local_addr
                ))
            })?
            .to_bytes();

        Ok(LocalResponse {
            status,
            headers,
            body,
        })
    }
}
