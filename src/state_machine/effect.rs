//! Effects produced by state transitions

use crate::model::ChatSummary;
use super::StreamStatus;
use thiserror::Error;

/// Work for the caller after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Overwrite the chat list entry with this projection
    SyncChatEntry(ChatSummary),

    /// The stream reached a terminal status
    StreamTerminated(StreamStatus),

    /// The event was not applied; the state is unchanged
    Ignored(ProtocolError),
}

/// An event that does not fit the current conversation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{event} for unknown message {message_id:?}")]
    UnknownMessage {
        event: &'static str,
        message_id: String,
    },
    #[error("message {message_id} already exists")]
    DuplicateMessage { message_id: String },
    #[error("{event} for message {message_id} after it was finalized")]
    AlreadyFinalized {
        event: &'static str,
        message_id: String,
    },
    #[error("{event} after the stream terminated")]
    AfterTermination { event: &'static str },
}
