//! Protocol frame definitions

use bytes::Bytes;

/// Ordered header multimap.
///
/// Repeated names represent multiple values; per-name order is preserved
/// end to end, which a `HashMap` keyed on name would lose.
pub type Headers = Vec<(String, String)>;

/// A public HTTP request relayed to the tunnel client.
///
/// The correlation `id` is generated by the server and links this frame to
/// the [`ResponseFrame`] the client eventually writes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    /// Request path including any query string.
    pub path: String,
    pub headers: Headers,
    pub body: Bytes,
}

/// A local-service response relayed back to the tunnel server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub id: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl ResponseFrame {
    /// A synthetic response carrying only a status code.
    ///
    /// Used by the client when the local service cannot be reached: the
    /// tunnel always answers, it never propagates a raw transport error.
    pub fn synthetic(id: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }
}
