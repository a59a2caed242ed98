//! Codecs for encoding and decoding tunnel frames
//!
//! Frames are textual up to the body: a request line (or response id and
//! status lines), a header block terminated by an empty line, then a 4-byte
//! big-endian length prefix and the raw body bytes.
//!
//! Request frame:
//! ```text
//! <id> <METHOD> <path>\n
//! <name>: <value>\n
//! ...
//! \n
//! <u32 body length><body>
//! ```
//!
//! Response frame:
//! ```text
//! <id>\n
//! <status>\n
//! <name>: <value>\n
//! ...
//! \n
//! <u32 body length><body>
//! ```

use crate::constants::{BODY_LEN_PREFIX, MAX_BODY_SIZE, MAX_LINE_LENGTH};
use crate::frame::{Headers, RequestFrame, ResponseFrame};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer sent bytes that violate the frame grammar.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The stream ended in the middle of a frame.
    #[error("connection closed mid-frame")]
    ConnectionClosed,

    /// Transport failure during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Codec for [`RequestFrame`]s (server encodes, client decodes).
#[derive(Debug, Clone, Copy)]
pub struct RequestCodec {
    max_body_size: u32,
}

/// Codec for [`ResponseFrame`]s (client encodes, server decodes).
#[derive(Debug, Clone, Copy)]
pub struct ResponseCodec {
    max_body_size: u32,
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self {
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

impl Default for ResponseCodec {
    fn default() -> Self {
        Self {
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

impl RequestCodec {
    /// Create a codec with the default body size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom body size limit.
    pub fn with_max_body_size(max_body_size: u32) -> Self {
        Self { max_body_size }
    }
}

impl ResponseCodec {
    /// Create a codec with the default body size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with a custom body size limit.
    pub fn with_max_body_size(max_body_size: u32) -> Self {
        Self { max_body_size }
    }
}

/// The complete line starting at `pos`, trimmed, plus the offset just past
/// its newline. `None` until the newline is buffered.
fn take_line(src: &BytesMut, pos: usize) -> Result<Option<(String, usize)>, CodecError> {
    let Some(offset) = src[pos..].iter().position(|&b| b == b'\n') else {
        if src.len() - pos > MAX_LINE_LENGTH {
            return Err(CodecError::MalformedFrame(
                "line exceeds maximum length".into(),
            ));
        }
        return Ok(None);
    };

    if offset > MAX_LINE_LENGTH {
        return Err(CodecError::MalformedFrame(
            "line exceeds maximum length".into(),
        ));
    }

    let line = std::str::from_utf8(&src[pos..pos + offset])
        .map_err(|_| CodecError::MalformedFrame("line is not valid UTF-8".into()))?;

    Ok(Some((line.trim().to_owned(), pos + offset + 1)))
}

/// The header block starting at `pos`, up to and including the empty
/// terminator line. Lines without a `:` separator are skipped, not fatal.
fn take_headers(src: &BytesMut, mut pos: usize) -> Result<Option<(Headers, usize)>, CodecError> {
    let mut headers = Headers::new();
    loop {
        let Some((line, next)) = take_line(src, pos)? else {
            return Ok(None);
        };
        pos = next;

        if line.is_empty() {
            return Ok(Some((headers, pos)));
        }

        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_owned(), value.trim().to_owned()));
        }
    }
}

/// The declared body length at `pos`, plus the offset of the first body
/// byte. `None` until the 4-byte prefix is buffered.
fn take_body_len(
    src: &BytesMut,
    pos: usize,
    max_body_size: u32,
) -> Result<Option<(usize, usize)>, CodecError> {
    if src.len() < pos + BODY_LEN_PREFIX {
        return Ok(None);
    }

    let mut len_bytes = [0u8; BODY_LEN_PREFIX];
    len_bytes.copy_from_slice(&src[pos..pos + BODY_LEN_PREFIX]);
    let body_len = u32::from_be_bytes(len_bytes);

    if body_len > max_body_size {
        return Err(CodecError::MalformedFrame(format!(
            "declared body length {body_len} exceeds limit {max_body_size}"
        )));
    }

    Ok(Some((body_len as usize, pos + BODY_LEN_PREFIX)))
}

fn put_headers(dst: &mut BytesMut, headers: &Headers) {
    for (name, value) in headers {
        dst.extend_from_slice(name.as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(value.as_bytes());
        dst.put_u8(b'\n');
    }
    dst.put_u8(b'\n');
}

fn put_body(dst: &mut BytesMut, body: &Bytes) -> Result<(), CodecError> {
    let len = u32::try_from(body.len())
        .map_err(|_| CodecError::MalformedFrame("body length does not fit in u32".into()))?;
    dst.put_u32(len);
    dst.extend_from_slice(body);
    Ok(())
}

/// Consume the fully-buffered frame: the textual prefix ending at
/// `body_start`, then `body_len` body bytes. `None` until all body bytes
/// are available.
fn split_frame(src: &mut BytesMut, body_start: usize, body_len: usize) -> Option<Bytes> {
    if src.len() < body_start + body_len {
        src.reserve(body_start + body_len - src.len());
        return None;
    }
    src.advance(body_start);
    Some(src.split_to(body_len).freeze())
}

impl Decoder for RequestCodec {
    type Item = RequestFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((line, after_line)) = take_line(src, 0)? else {
            return Ok(None);
        };

        let mut fields = line.split_whitespace();
        let (Some(id), Some(method), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(CodecError::MalformedFrame(format!(
                "request line {line:?} has fewer than three fields"
            )));
        };
        let (id, method, path) = (id.to_owned(), method.to_owned(), path.to_owned());

        let Some((headers, after_headers)) = take_headers(src, after_line)? else {
            return Ok(None);
        };

        let Some((body_len, body_start)) = take_body_len(src, after_headers, self.max_body_size)?
        else {
            return Ok(None);
        };

        let Some(body) = split_frame(src, body_start, body_len) else {
            return Ok(None);
        };

        Ok(Some(RequestFrame {
            id,
            method,
            path,
            headers,
            body,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::ConnectionClosed),
        }
    }
}

impl Encoder<RequestFrame> for RequestCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: RequestFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(
            frame.id.len()
                + frame.method.len()
                + frame.path.len()
                + 3
                + BODY_LEN_PREFIX
                + frame.body.len(),
        );

        dst.extend_from_slice(frame.id.as_bytes());
        dst.put_u8(b' ');
        dst.extend_from_slice(frame.method.as_bytes());
        dst.put_u8(b' ');
        dst.extend_from_slice(frame.path.as_bytes());
        dst.put_u8(b'\n');

        put_headers(dst, &frame.headers);
        put_body(dst, &frame.body)
    }
}

impl Decoder for ResponseCodec {
    type Item = ResponseFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((id, after_id)) = take_line(src, 0)? else {
            return Ok(None);
        };

        let Some((status_line, after_status)) = take_line(src, after_id)? else {
            return Ok(None);
        };
        let status: u16 = status_line.parse().map_err(|_| {
            CodecError::MalformedFrame(format!("status code {status_line:?} is not an integer"))
        })?;

        let Some((headers, after_headers)) = take_headers(src, after_status)? else {
            return Ok(None);
        };

        let Some((body_len, body_start)) = take_body_len(src, after_headers, self.max_body_size)?
        else {
            return Ok(None);
        };

        let Some(body) = split_frame(src, body_start, body_len) else {
            return Ok(None);
        };

        Ok(Some(ResponseFrame {
            id,
            status,
            headers,
            body,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::ConnectionClosed),
        }
    }
}

impl Encoder<ResponseFrame> for ResponseCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: ResponseFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(frame.id.len() + 8 + BODY_LEN_PREFIX + frame.body.len());

        dst.extend_from_slice(frame.id.as_bytes());
        dst.put_u8(b'\n');
        dst.extend_from_slice(frame.status.to_string().as_bytes());
        dst.put_u8(b'\n');

        put_headers(dst, &frame.headers);
        put_body(dst, &frame.body)
    }
}
