//! Conversation state types

use crate::model::Conversation;
use chrono::{DateTime, Utc};

/// Lifecycle of the response stream for the current send
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamStatus {
    /// No stream has been opened for this conversation yet
    #[default]
    Idle,
    Open,
    /// Stream ended normally
    Completed,
    /// Server reported an error or the transport failed
    Failed { detail: String },
    Cancelled,
}

impl StreamStatus {
    /// Whether the stream has reached a final state and accepts no more events
    pub fn is_terminated(&self) -> bool {
        matches!(
            self,
            StreamStatus::Completed | StreamStatus::Failed { .. } | StreamStatus::Cancelled
        )
    }
}

/// The active conversation plus the state of its response stream
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub conversation: Conversation,
    pub stream: StreamStatus,
}

impl ConversationState {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            stream: StreamStatus::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    /// A message is still being streamed into
    pub fn has_streaming_message(&self) -> bool {
        self.conversation.streaming_message().is_some()
    }
}

/// Inputs a transition needs from outside the state
#[derive(Debug, Clone, Copy)]
pub struct ReduceContext {
    pub now: DateTime<Utc>,
}

impl ReduceContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Context stamped with the current wall clock
    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}
