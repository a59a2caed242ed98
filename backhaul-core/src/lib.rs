//! Core tunnel implementation: the waiter table, the control-connection
//! server and client, and the single-writer frame sender.

pub mod forward;
pub mod sender;
pub mod tunnel;
pub mod waiters;

// Re-export specific items for convenience
pub use forward::{Forwarder, LocalRequest, LocalResponse};
pub use tunnel::client::TunnelClient;
pub use tunnel::server::{TunnelServer, TunnelState};
pub use waiters::{Waiter, WaiterTable};
