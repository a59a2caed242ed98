//! Public HTTP ingress
//!
//! Accepts ordinary HTTP requests and relays each one through the tunnel
//! via [`TunnelState::dispatch`], translating tunnel errors into synthetic
//! responses so callers always get a bounded answer.

use crate::forward::is_hop_by_hop;
use backhaul_common::config::LimitsConfig;
use backhaul_common::{Result, TunnelError};
use backhaul_core::TunnelState;
use backhaul_protocol::{Headers, ResponseFrame};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Configuration for HTTP ingress limits
#[derive(Debug, Clone)]
pub struct IngressConfig {
    /// Maximum concurrent public connections
    pub max_connections: usize,
    /// Maximum request body size relayed through the tunnel
    pub max_body_bytes: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        let limits = LimitsConfig::default();
        Self {
            max_connections: limits.max_http_connections,
            max_body_bytes: limits.max_body_bytes as usize,
        }
    }
}

pub struct HttpIngress {
    addr: SocketAddr,
    state: Arc<TunnelState>,
    config: IngressConfig,
    connection_semaphore: Arc<Semaphore>,
}

impl HttpIngress {
    pub fn new(addr: SocketAddr, state: Arc<TunnelState>) -> Self {
        Self::with_config(addr, state, IngressConfig::default())
    }

    pub fn with_config(addr: SocketAddr, state: Arc<TunnelState>, config: IngressConfig) -> Self {
        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));
        Self {
            addr,
            state,
            config,
            connection_semaphore,
        }
    }

    pub async fn start(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("HTTP ingress listening on {}", self.addr);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("accept error on HTTP ingress: {e}");
                    continue;
                }
            };

            let Ok(permit) = self.connection_semaphore.clone().try_acquire_owned() else {
                warn!("max connections reached, rejecting connection from {peer_addr}");
                drop(stream);
                continue;
            };

            let io = TokioIo::new(stream);
            let state = self.state.clone();
            let max_body_bytes = self.config.max_body_bytes;

            tokio::spawn(async move {
                let _permit = permit; // held until the connection closes

                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(handle_request(&state, req, max_body_bytes).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("connection error from {peer_addr}: {e}");
                }
            });
        }
    }
}

/// Relay one public request through the tunnel.
async fn handle_request<B>(
    state: &TunnelState,
    req: Request<B>,
    max_body_bytes: usize,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().as_str().to_owned();
    let path = req
        .uri()
        .path_and_query()
        .map_or_else(|| "/".to_owned(), |pq| pq.as_str().to_owned());
    let headers: Headers = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = match Limited::new(req.into_body(), max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
        Err(e) => {
            debug!("failed to read request body: {e}");
            return text_response(StatusCode::BAD_REQUEST, "unreadable request body");
        }
    };

    match state.dispatch(method, path, headers, body).await {
        Ok(frame) => relay_response(frame),
        Err(TunnelError::TunnelNotReady) => {
            text_response(StatusCode::SERVICE_UNAVAILABLE, "tunnel not ready")
        }
        Err(TunnelError::Timeout(_)) => {
            text_response(StatusCode::GATEWAY_TIMEOUT, "upstream timed out")
        }
        Err(TunnelError::TunnelClosed) => {
            text_response(StatusCode::BAD_GATEWAY, "tunnel connection lost")
        }
        Err(e) => {
            error!("dispatch failed: {e}");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Copy a relayed response frame into a public HTTP response.
fn relay_response(frame: ResponseFrame) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(frame.body));
    *response.status_mut() =
        StatusCode::from_u16(frame.status).unwrap_or(StatusCode::BAD_GATEWAY);

    for (name, value) in frame.headers {
        if is_hop_by_hop(&name) {
            continue;
        }
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(n), Ok(v)) => {
                response.headers_mut().append(n, v);
            }
            _ => warn!(%name, "skipping invalid relayed header"),
        }
    }

    response
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
