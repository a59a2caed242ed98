//! Common utilities and types for Backhaul

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

pub use config::{LimitsConfig, TimeoutConfig};
pub use constants::{
    DEFAULT_CONTROL_BIND, DEFAULT_CONTROL_PORT, DEFAULT_HTTP_BIND, DEFAULT_HTTP_PORT,
    DEFAULT_LOCAL_ADDR,
};
pub use error::{Result, TunnelError};
pub use logging::init_logging;
