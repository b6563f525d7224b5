//! Newline-delimited JSON framing for embedders that carry the console
//! protocol over a byte stream (the shipped stdio host does).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use crate::ProtocolError;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Serializes one message as a newline-terminated JSON frame.
pub fn encode_frame<T: Serialize>(value: &T, max_frame_bytes: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut encoded =
        serde_json::to_vec(value).map_err(|err| ProtocolError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(ProtocolError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    encoded.push(b'\n');
    Ok(encoded)
}

/// Incremental decoder over arbitrary chunk boundaries. Malformed or
/// oversized lines are reported per frame; the stream keeps going.
pub struct FrameDecoder<T> {
    max_frame_bytes: usize,
    pending: Vec<u8>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Default for FrameDecoder<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl<T> FrameDecoder<T> {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending: Vec::new(),
            marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> FrameDecoder<T> {
    /// Feeds a chunk and returns one entry per complete line seen so far.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Result<T, ProtocolError>> {
        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(result) = self.decode_line(&line) {
                out.push(result);
            }
        }

        if self.pending.len() > self.max_frame_bytes {
            out.push(Err(ProtocolError::OversizedBuffer {
                size: self.pending.len(),
                max: self.max_frame_bytes,
            }));
            self.pending.clear();
        }

        out
    }

    /// Flushes a final unterminated line at end of stream.
    pub fn finish(&mut self) -> Option<Result<T, ProtocolError>> {
        let line = std::mem::take(&mut self.pending);
        self.decode_line(&line)
    }

    fn decode_line(&self, line: &[u8]) -> Option<Result<T, ProtocolError>> {
        let trimmed = trim_line(line);
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() > self.max_frame_bytes {
            return Some(Err(ProtocolError::OversizedFrame {
                size: trimmed.len(),
                max: self.max_frame_bytes,
            }));
        }
        Some(
            serde_json::from_slice(trimmed)
                .map_err(|err| ProtocolError::Decode(err.to_string())),
        )
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut trimmed = line;
    while let [rest @ .., last] = trimmed {
        if *last == b'\n' || *last == b'\r' {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed
}
