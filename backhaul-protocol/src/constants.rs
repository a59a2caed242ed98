//! Protocol limits

/// Maximum length of a single request/status/header line in bytes.
///
/// A peer that streams more than this without a newline is not speaking the
/// protocol and the decoder rejects the frame instead of buffering forever.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Maximum declared body length (16MB).
pub const MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;

/// Number of bytes in the body length prefix.
pub const BODY_LEN_PREFIX: usize = 4;
