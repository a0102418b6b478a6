//! NDJSON codec for the proxied server's stdio streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum line length
//! to prevent memory exhaustion from an unterminated or malformed frame on
//! the child's stdout.
//!
//! Use [`FrameCodec`] as the codec parameter for
//! [`tokio_util::codec::FramedRead`]. Each newline-terminated (`\n`) UTF-8
//! string is one complete JSON-RPC frame; an incomplete trailing fragment
//! stays buffered until more bytes arrive.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum frame length accepted by the codec: 1 MiB.
///
/// Inbound lines exceeding this limit cause [`FrameCodec::decode`] to return
/// [`AppError::Proxy`] with `"frame too long"` instead of allocating
/// unbounded memory for a single frame.
pub const MAX_FRAME_BYTES: usize = 1_048_576;

/// Line framing codec for the proxied server's JSON-RPC stream.
///
/// Delegates framing to [`LinesCodec`] with a fixed [`MAX_FRAME_BYTES`]
/// limit. The decoder yields complete frames in order and never drops bytes:
/// the last unterminated segment is retained internally as the next buffer.
#[derive(Debug)]
pub struct FrameCodec(LinesCodec);

impl FrameCodec {
    /// Create a new `FrameCodec` with the default [`MAX_FRAME_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_FRAME_BYTES))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated frame from `src`.
    ///
    /// Returns `Ok(None)` when `src` holds no complete frame yet (buffering).
    /// Returns `Err(AppError::Proxy("frame too long: …"))` when the frame
    /// exceeds [`MAX_FRAME_BYTES`].
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Decode the final frame when the stream reaches EOF.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for FrameCodec {
    type Error = AppError;

    /// Encode `item` as a `\n`-terminated line into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] on underlying I/O failures.
    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        // The max-length limit is a decoder-side concern only.
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Proxy(format!("frame too long: exceeded {MAX_FRAME_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
