//! HTTP surfaces for Backhaul: the public ingress on the server side and
//! the local-service forwarder on the client side. The tunnel core is
//! HTTP-agnostic; everything hyper-shaped lives here.

pub mod forward;
pub mod ingress;

pub use forward::HttpForwarder;
pub use ingress::{HttpIngress, IngressConfig};
