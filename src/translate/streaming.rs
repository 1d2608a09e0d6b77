//! Streaming relay: provider chunk stream in, raw text fragments out.
//!
//! The provider emits a sequence of JSON chunks, optionally wrapped in SSE
//! `data:` framing. [`ChunkDecoder`] buffers incoming bytes and yields each
//! chunk as soon as it is complete; [`relay_fragments`] turns those chunks into
//! one [`RelayEvent::Fragment`] per non-empty text delta and finishes with a
//! single [`RelayEvent::Finished`] carrying the [`StreamOutcome`].
//!
//! Forwarding is best-effort: the first malformed chunk ends the relay. Nothing
//! is written to the caller at that point since the status line and earlier
//! fragments are already on the wire.

use super::upstream_types::UpstreamChunk;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::fmt::Display;

const SSE_DATA_PREFIX: &[u8] = b"data:";
const SSE_DONE_SENTINEL: &[u8] = b"[DONE]";

/// Largest single chunk the decoder will buffer before giving up.
pub const MAX_PENDING_CHUNK_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed chunk: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("chunk exceeds {limit} bytes without completing")]
    Oversized { limit: usize },
}

/// How a relayed stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Upstream body was exhausted (or sent `[DONE]`) after well-formed chunks.
    Completed,
    /// Forwarding stopped early; fragments relayed before this point stand.
    Truncated { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A text fragment to write (and flush) to the caller verbatim.
    Fragment(Bytes),
    /// Always the last event of a relay.
    Finished {
        outcome: StreamOutcome,
        fragments: usize,
    },
}

/// One decoded unit of the upstream stream.
#[derive(Debug)]
pub enum Frame {
    Chunk(UpstreamChunk),
    Done,
}

/// Incremental decoder for a byte stream of concatenated JSON chunks.
///
/// After a parse attempt runs out of input, the buffer is not re-parsed until
/// a read brings a byte that can close a chunk (`}` or `]`).
#[derive(Debug)]
pub struct ChunkDecoder {
    buf: Vec<u8>,
    awaiting_close: bool,
    limit: usize,
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_CHUNK_BYTES)
    }
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            awaiting_close: false,
            limit,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if self.awaiting_close && bytes.iter().any(|b| matches!(b, b'}' | b']')) {
            self.awaiting_close = false;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next complete frame. `Ok(None)` means more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.awaiting_close {
            return self.still_pending();
        }

        loop {
            self.skip_whitespace();
            if self.buf.is_empty() {
                return Ok(None);
            }

            if self.buf.starts_with(SSE_DATA_PREFIX) {
                self.buf.drain(..SSE_DATA_PREFIX.len());
                continue;
            }
            if self.buf.starts_with(SSE_DONE_SENTINEL) {
                self.buf.drain(..SSE_DONE_SENTINEL.len());
                return Ok(Some(Frame::Done));
            }
            if SSE_DATA_PREFIX.starts_with(&self.buf) || SSE_DONE_SENTINEL.starts_with(&self.buf) {
                return Ok(None);
            }

            let (next, consumed) = {
                let mut values =
                    serde_json::Deserializer::from_slice(&self.buf).into_iter::<UpstreamChunk>();
                let next = values.next();
                (next, values.byte_offset())
            };

            return match next {
                Some(Ok(chunk)) => {
                    self.buf.drain(..consumed);
                    Ok(Some(Frame::Chunk(chunk)))
                }
                Some(Err(e)) if e.is_eof() => {
                    self.awaiting_close = true;
                    self.still_pending()
                }
                Some(Err(e)) => Err(e.into()),
                None => {
                    self.buf.clear();
                    Ok(None)
                }
            };
        }
    }

    /// Called once the upstream body is exhausted. Returns a description of any
    /// leftover bytes that never formed a complete chunk.
    pub fn finish(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.buf.is_empty() {
            None
        } else {
            Some(format!(
                "upstream ended inside a chunk ({} trailing bytes)",
                self.buf.len()
            ))
        }
    }

    fn still_pending(&self) -> Result<Option<Frame>, DecodeError> {
        if self.buf.len() > self.limit {
            Err(DecodeError::Oversized { limit: self.limit })
        } else {
            Ok(None)
        }
    }

    fn skip_whitespace(&mut self) {
        let start = self
            .buf
            .iter()
            .position(|b| !matches!(b, b' ' | b'\n' | b'\r' | b'\t'))
            .unwrap_or(self.buf.len());
        if start > 0 {
            self.buf.drain(..start);
        }
    }
}

/// Relay an upstream byte stream as text fragments.
///
/// Each non-empty first-choice delta becomes its own event so the caller can
/// flush it immediately; nothing beyond the current partial chunk is buffered.
pub fn relay_fragments<S, E>(byte_stream: S) -> impl Stream<Item = RelayEvent> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = ChunkDecoder::new();
        let mut fragments = 0usize;

        tokio::pin!(byte_stream);

        let outcome = 'relay: loop {
            loop {
                match decoder.next_frame() {
                    Ok(Some(Frame::Chunk(chunk))) => {
                        if let Some(text) = chunk.fragment() {
                            fragments += 1;
                            yield RelayEvent::Fragment(Bytes::copy_from_slice(text.as_bytes()));
                        }
                    }
                    Ok(Some(Frame::Done)) => break 'relay StreamOutcome::Completed,
                    Ok(None) => break,
                    Err(e) => {
                        break 'relay StreamOutcome::Truncated {
                            reason: e.to_string(),
                        }
                    }
                }
            }

            match byte_stream.next().await {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => {
                    break 'relay StreamOutcome::Truncated {
                        reason: format!("upstream read failed: {}", e),
                    }
                }
                None => {
                    break 'relay match decoder.finish() {
                        None => StreamOutcome::Completed,
                        Some(reason) => StreamOutcome::Truncated { reason },
                    }
                }
            }
        };

        yield RelayEvent::Finished { outcome, fragments };
    }
}
