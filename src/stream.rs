//! Event stream decoding
//!
//! Turns the transport's chunked byte stream into typed [`StreamEvent`]s.

mod decoder;
mod event;

#[cfg(test)]
mod proptests;

pub use decoder::{decode_events, FrameDecoder};
pub use event::{DecodeError, StreamEvent};
