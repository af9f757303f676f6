//! Line-buffered decoder for the message event stream
//!
//! Chunks may split a record anywhere, including inside a multi-byte
//! character, so bytes are buffered until a full line is available and only
//! complete lines are converted to text.

use super::event::{FrameInterpreter, StreamEvent};
use crate::transport::TransportError;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;

const DATA_PREFIX: &str = "data:";

/// Longest line kept in memory; longer records are dropped
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental decoder: feed chunks, collect events.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    /// Inside an oversized line whose head was dropped
    discarding: bool,
    interpreter: FrameInterpreter,
    finished: bool,
    skipped: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            discarding: false,
            interpreter: FrameInterpreter::default(),
            finished: false,
            skipped: 0,
        }
    }

    /// Feed the next chunk and return the events it completed.
    ///
    /// Input after a terminal event is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let mut line = self.buffer.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if let Some(event) = self.decode_line(&line) {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.finished = true;
                    self.buffer.clear();
                    return events;
                }
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(len = self.buffer.len(), "Dropping oversized stream line");
            if !self.discarding {
                self.skipped += 1;
            }
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        events
    }

    /// Signal end of input. A trailing line without a newline is still decoded.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished || self.discarding || self.buffer.is_empty() {
            self.finished = true;
            return Vec::new();
        }
        let rest = self.buffer.split();
        self.finished = true;
        self.decode_line(&rest).into_iter().collect()
    }

    /// True once a terminal frame was decoded or input ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of data records dropped because they failed to decode
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<StreamEvent> {
        let Ok(line) = std::str::from_utf8(line) else {
            tracing::warn!(len = line.len(), "Skipping stream line with invalid UTF-8");
            self.skipped += 1;
            return None;
        };
        let payload = extract_data(line)?;
        match self.interpreter.interpret(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, payload = %preview(payload), "Dropping undecodable stream record");
                self.skipped += 1;
                None
            }
        }
    }
}

/// Payload of a data record, or `None` for any other line
fn extract_data(line: &str) -> Option<&str> {
    let data = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    if data.is_empty() {
        None
    } else {
        Some(data)
    }
}

fn preview(payload: &str) -> String {
    payload.chars().take(100).collect()
}

/// Decode a transport byte stream into events.
///
/// The returned stream is lazy and finite: it ends after a terminal frame,
/// when the transport closes, or right after yielding a transport error.
pub fn decode_events<S>(
    bytes: S,
) -> impl Stream<Item = Result<StreamEvent, TransportError>> + Send
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (bytes, FrameDecoder::new(), VecDeque::new(), false),
        |(mut bytes, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((Ok(event), (bytes, decoder, pending, done)));
                }
                if done || decoder.is_finished() {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e), (bytes, decoder, pending, done)));
                    }
                    None => {
                        done = true;
                        pending.extend(decoder.finish());
                    }
                }
            }
        },
    )
}
