pub mod client;
pub mod server;

pub use client::TunnelClient;
pub use server::{TunnelServer, TunnelState};
