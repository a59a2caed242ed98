//! Single-writer frame sender
//!
//! Exactly one sender task owns the write half of a control connection.
//! Concurrent producers hand frames to it over a bounded channel, which
//! serializes writes so each frame reaches the wire as an uninterrupted
//! unit without a lock held across I/O.

use futures::SinkExt;
use kanal::AsyncReceiver;
use tokio::io::AsyncWrite;
use tokio_util::codec::{Encoder, FramedWrite};
use tracing::{debug, warn};

/// Drain `frames` into `sink` until the channel closes or a write fails.
///
/// On write failure the task exits and drops the receiver; producers then
/// observe a closed channel on their next send, which is the signal that
/// the connection is gone.
pub async fn run_frame_sender<W, C, F>(frames: AsyncReceiver<F>, mut sink: FramedWrite<W, C>)
where
    W: AsyncWrite + Unpin,
    C: Encoder<F>,
    C::Error: std::fmt::Display,
{
    while let Ok(frame) = frames.recv().await {
        if let Err(e) = sink.send(frame).await {
            warn!("frame sender stopped: {e}");
            return;
        }
    }
    debug!("frame sender drained, channel closed");
}
