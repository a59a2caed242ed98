//! Error types for Backhaul

use backhaul_protocol::CodecError;
use thiserror::Error;

/// Main error type for Backhaul operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding or decoding failed
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Control connection failure
    #[error("connection failed: {0}")]
    Connection(String),

    /// No tunnel client is attached; nothing to relay to
    #[error("tunnel not ready")]
    TunnelNotReady,

    /// The control connection was lost while a request was in flight
    #[error("tunnel connection lost")]
    TunnelClosed,

    /// A bounded wait elapsed
    #[error("timeout: {0}")]
    Timeout(String),

    /// The local service could not be reached or failed mid-request
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TunnelError>;
