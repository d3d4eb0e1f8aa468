//! Firehose frame decoding. The streaming endpoint delivers one JSON
//! document per `\r\n`-terminated line, with bare blank lines as
//! keep-alives. Non-status control messages (deletion notices, stall
//! warnings) are skipped, not surfaced.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::error::{Result, TwitterError};
use crate::types::RawStatus;

pub type PostStream = Pin<Box<dyn Stream<Item = Result<RawStatus>> + Send>>;

/// Accumulates raw bytes and yields complete lines. Partial lines are
/// held until their terminator arrives in a later chunk.
#[derive(Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete line, stripped of its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Decode a byte stream from the firehose into status items.
pub fn decode_post_stream<S, E>(bytes: S) -> PostStream
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send,
{
    let stream = async_stream::try_stream! {
        let mut framer = LineFramer::new();
        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| TwitterError::Stream(e.to_string()))?;
            framer.push(&chunk);
            while let Some(line) = framer.next_line() {
                if line.trim().is_empty() {
                    // keep-alive
                    continue;
                }
                match serde_json::from_str::<RawStatus>(&line) {
                    Ok(status) => yield status,
                    Err(err) => {
                        tracing::debug!(%err, "Skipping non-status stream frame");
                    }
                }
            }
        }
    };
    Box::pin(stream)
}
