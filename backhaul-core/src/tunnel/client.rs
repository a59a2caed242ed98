//! Tunnel client: sequential frame intake, concurrent local forwarding.

use crate::forward::{Forwarder, LocalRequest};
use crate::sender::run_frame_sender;
use backhaul_common::config::LimitsConfig;
use backhaul_common::constants::STATUS_GATEWAY_TIMEOUT;
use backhaul_common::{Result, TunnelError};
use backhaul_protocol::{RequestCodec, RequestFrame, ResponseCodec, ResponseFrame};
use futures::StreamExt;
use kanal::{bounded_async, AsyncSender};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// Connects out to the tunnel server and forwards relayed requests to the
/// local service.
///
/// The intake loop is strictly sequential — only one reader may consume
/// the shared control stream — but every decoded request is handed to its
/// own task immediately, so a slow local response never stalls intake of
/// unrelated requests behind it.
pub struct TunnelClient {
    server_addr: String,
    limits: LimitsConfig,
}

impl TunnelClient {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            limits: LimitsConfig::default(),
        }
    }

    /// Bound on concurrently in-flight forwards; intake waits for a free
    /// slot rather than growing without limit.
    #[must_use]
    pub fn with_max_inflight(mut self, max_inflight: usize) -> Self {
        self.limits.max_inflight_forwards = max_inflight;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Dial the control connection and serve until it is lost.
    pub async fn run<F: Forwarder>(self, forwarder: F) -> Result<()> {
        let stream = TcpStream::connect(&self.server_addr).await.map_err(|e| {
            TunnelError::Connection(format!("connecting to {}: {e}", self.server_addr))
        })?;
        info!("connected to {}, tunnel open", self.server_addr);
        self.run_on(stream, forwarder).await
    }

    /// Serve an already-established control connection.
    ///
    /// Always returns an error: the only way out is losing the control
    /// connection, and that terminal state is reported, not swallowed.
    /// Reconnecting is the caller's policy decision.
    pub async fn run_on<F: Forwarder>(self, stream: TcpStream, forwarder: F) -> Result<()> {
        let (read_half, write_half) = stream.into_split();

        let (response_tx, response_rx) =
            bounded_async::<ResponseFrame>(self.limits.write_queue_depth);
        // Tying the writer to this future means tearing down intake also
        // drops the write half, so the server observes the loss instead of
        // holding a half-open connection.
        let _sender_guard = AbortOnDrop(tokio::spawn(run_frame_sender(
            response_rx,
            FramedWrite::new(
                write_half,
                ResponseCodec::with_max_body_size(self.limits.max_body_bytes),
            ),
        )));

        let forwarder = Arc::new(forwarder);
        let permits = Arc::new(Semaphore::new(self.limits.max_inflight_forwards));
        let mut requests = FramedRead::new(
            read_half,
            RequestCodec::with_max_body_size(self.limits.max_body_bytes),
        );

        while let Some(next) = requests.next().await {
            let frame = next?;

            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let forwarder = forwarder.clone();
            let response_tx = response_tx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                forward_one(frame, forwarder.as_ref(), &response_tx).await;
            });
        }

        Err(TunnelError::Connection(
            "control connection closed by server".into(),
        ))
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Forward one request to the local service and queue the response frame.
///
/// A transport failure becomes a synthetic 504 with empty headers and
/// body; the raw error is logged here and never crosses the tunnel.
async fn forward_one<F: Forwarder>(
    frame: RequestFrame,
    forwarder: &F,
    response_tx: &AsyncSender<ResponseFrame>,
) {
    let RequestFrame {
        id,
        method,
        path,
        headers,
        body,
    } = frame;

    debug!(%id, %method, %path, "forwarding to local service");
    let response = match forwarder
        .forward(LocalRequest {
            method,
            path,
            headers,
            body,
        })
        .await
    {
        Ok(local) => ResponseFrame {
            id,
            status: local.status,
            headers: local.headers,
            body: local.body,
        },
        Err(e) => {
            warn!(%id, "local service unavailable: {e}");
            ResponseFrame::synthetic(id, STATUS_GATEWAY_TIMEOUT)
        }
    };

    if response_tx.send(response).await.is_err() {
        warn!("response writer gone, dropping response");
    }
}
