//! Backhaul wire protocol
//!
//! This crate defines the framing used on the control connection between
//! Backhaul servers and clients: a textual request/response line, an HTTP
//! style header block, and a length-prefixed body.

pub mod codec;
pub mod constants;
pub mod frame;

pub use codec::{CodecError, RequestCodec, ResponseCodec};
pub use frame::{Headers, RequestFrame, ResponseFrame};
