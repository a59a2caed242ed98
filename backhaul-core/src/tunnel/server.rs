//! Tunnel server: control-connection acceptor, response reader, and the
//! dispatch path that relays one public HTTP request through the tunnel.

use crate::sender::run_frame_sender;
use crate::waiters::WaiterTable;
use backhaul_common::config::{LimitsConfig, TimeoutConfig};
use backhaul_common::{Result, TunnelError};
use backhaul_protocol::{Headers, RequestCodec, RequestFrame, ResponseCodec, ResponseFrame};
use bytes::Bytes;
use futures::StreamExt;
use kanal::{bounded_async, AsyncSender};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Handle to the currently attached control connection.
///
/// Holding the frame sender is what keeps the writer task alive; dropping
/// the handle (detach) closes the channel and winds the writer down.
#[derive(Debug, Clone)]
pub(crate) struct ControlHandle {
    frame_tx: AsyncSender<RequestFrame>,
    peer: SocketAddr,
}

/// Shared server state: the control-connection slot and the waiter table.
///
/// An explicit context object rather than process globals, so independent
/// server instances can coexist (one per test, for example). The HTTP
/// ingress holds an `Arc<TunnelState>` and calls [`dispatch`].
///
/// [`dispatch`]: TunnelState::dispatch
#[derive(Debug)]
pub struct TunnelState {
    conn: Mutex<Option<ControlHandle>>,
    waiters: WaiterTable,
    request_timeout: Duration,
}

impl TunnelState {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            conn: Mutex::new(None),
            waiters: WaiterTable::new(),
            request_timeout,
        }
    }

    /// Whether a tunnel client is currently attached.
    pub async fn is_attached(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    pub fn waiters(&self) -> &WaiterTable {
        &self.waiters
    }

    /// Claim the connection slot. Returns `false` if another control
    /// connection is already active.
    pub(crate) async fn try_attach(&self, handle: ControlHandle) -> bool {
        let mut slot = self.conn.lock().await;
        if slot.is_some() {
            return false;
        }
        *slot = Some(handle);
        true
    }

    /// Free the connection slot, closing the writer channel.
    pub(crate) async fn detach(&self) {
        self.conn.lock().await.take();
    }

    async fn sender(&self) -> Option<AsyncSender<RequestFrame>> {
        self.conn
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.frame_tx.clone())
    }

    /// Relay one public request through the tunnel and wait for its
    /// response.
    ///
    /// The waiter is registered before the frame is handed to the writer,
    /// so the response cannot race past an empty table. No lock is held
    /// while waiting. On deadline expiry or connection loss the waiter is
    /// reclaimed and a synthetic error returned instead of hanging.
    pub async fn dispatch(
        &self,
        method: String,
        path: String,
        headers: Headers,
        body: Bytes,
    ) -> Result<ResponseFrame> {
        let Some(frame_tx) = self.sender().await else {
            return Err(TunnelError::TunnelNotReady);
        };

        let id = Uuid::new_v4().to_string();
        let waiter = self.waiters.register(id.clone())?;

        let frame = RequestFrame {
            id: id.clone(),
            method,
            path,
            headers,
            body,
        };

        debug!(%id, "relaying request through tunnel");
        if frame_tx.send(frame).await.is_err() {
            self.waiters.take(&id);
            return Err(TunnelError::TunnelClosed);
        }

        match timeout(self.request_timeout, waiter.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.waiters.take(&id);
                Err(TunnelError::Timeout(format!(
                    "no response for request {id} within {:?}",
                    self.request_timeout
                )))
            }
        }
    }
}

/// Accepts the control connection and pumps response frames back into the
/// waiter table.
pub struct TunnelServer {
    addr: SocketAddr,
    limits: LimitsConfig,
    state: Arc<TunnelState>,
}

impl TunnelServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            limits: LimitsConfig::default(),
            state: Arc::new(TunnelState::new(TimeoutConfig::default().request_timeout)),
        }
    }

    /// Set the per-request response deadline.
    ///
    /// Call during construction, before [`state()`](Self::state) is shared.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.state = Arc::new(TunnelState::new(request_timeout));
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Shared state for wiring up the HTTP ingress.
    pub fn state(&self) -> Arc<TunnelState> {
        self.state.clone()
    }

    /// Bind the control listener and serve tunnel clients, one at a time.
    ///
    /// Failure to bind is fatal and propagates. While a control connection
    /// is active, later connection attempts are rejected and dropped; the
    /// slot frees once the active connection's reader exits.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("control listener on {}", self.addr);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("accept error on control listener: {e}");
                    continue;
                }
            };

            let (frame_tx, frame_rx) = bounded_async::<RequestFrame>(self.limits.write_queue_depth);
            let handle = ControlHandle { frame_tx, peer };

            if !self.state.try_attach(handle).await {
                warn!("rejecting tunnel client {peer}: a control connection is already active");
                drop(stream);
                continue;
            }
            info!("tunnel client connected: {peer}");

            let (read_half, write_half) = stream.into_split();

            tokio::spawn(run_frame_sender(
                frame_rx,
                FramedWrite::new(
                    write_half,
                    RequestCodec::with_max_body_size(self.limits.max_body_bytes),
                ),
            ));

            let state = self.state.clone();
            let max_body = self.limits.max_body_bytes;
            tokio::spawn(async move {
                let frames =
                    FramedRead::new(read_half, ResponseCodec::with_max_body_size(max_body));
                Self::read_responses(frames, &state).await;

                // Release pending waiters before freeing the slot, so a
                // fresh connection attaching right after detach cannot
                // have its new waiters swept away by this teardown.
                state.waiters().fail_all();
                state.detach().await;
                info!("tunnel client detached: {peer}");
            });
        }
    }

    /// Response reader: one loop for the connection's lifetime.
    ///
    /// Responses arrive in the client's completion order and are matched
    /// purely by correlation ID. An unmatched ID is dropped, never fatal;
    /// a decode error or EOF ends the loop.
    async fn read_responses(
        mut frames: FramedRead<OwnedReadHalf, ResponseCodec>,
        state: &TunnelState,
    ) {
        while let Some(next) = frames.next().await {
            match next {
                Ok(frame) => {
                    let id = frame.id.clone();
                    if !state.waiters().fulfill(&id, frame) {
                        warn!(%id, "dropping response with no registered waiter");
                    }
                }
                Err(e) => {
                    error!("response reader stopped: {e}");
                    return;
                }
            }
        }
        info!("control connection closed by client");
    }
}
