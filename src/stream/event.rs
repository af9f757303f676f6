//! Typed stream events and their wire representation

use serde::Deserialize;
use thiserror::Error;

/// One decoded record of a message stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Server echo of the user's message. The optimistic copy is already local.
    UserEchoed,
    AssistantStart {
        message_id: String,
    },
    ContentDelta {
        message_id: String,
        text: String,
    },
    AssistantComplete {
        message_id: String,
    },
    TitleAssigned {
        title: String,
    },
    StreamError {
        detail: String,
    },
    StreamEnd,
}

impl StreamEvent {
    /// Whether no further frames are expected after this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::StreamError { .. } | StreamEvent::StreamEnd)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::UserEchoed => "user_echoed",
            StreamEvent::AssistantStart { .. } => "assistant_start",
            StreamEvent::ContentDelta { .. } => "content_delta",
            StreamEvent::AssistantComplete { .. } => "assistant_complete",
            StreamEvent::TitleAssigned { .. } => "title_assigned",
            StreamEvent::StreamError { .. } => "stream_error",
            StreamEvent::StreamEnd => "stream_end",
        }
    }
}

/// A data record payload that could not be turned into a [`StreamEvent`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed record payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("completion record without a message id")]
    MissingMessageId,
}

/// JSON payload of a `data:` line, discriminated by `type`
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    UserMessage {
        #[serde(default)]
        #[allow(dead_code)] // echoed message body is not used
        message: Option<serde_json::Value>,
    },
    AiMessageStart {
        message_id: String,
    },
    ContentDelta {
        content: String,
        #[serde(default)]
        message_id: Option<String>,
    },
    AiMessageComplete {
        #[serde(default)]
        message: Option<CompletedMessage>,
        #[serde(default)]
        message_id: Option<String>,
    },
    ChatName {
        name: String,
    },
    Error {
        #[serde(default)]
        error: String,
    },
    StreamComplete,
}

#[derive(Debug, Deserialize)]
struct CompletedMessage {
    id: String,
}

/// Turns data-record payloads into events.
///
/// Content deltas on the wire may omit their message id; they belong to the
/// most recently started assistant message, which this tracks.
#[derive(Debug, Default)]
pub(crate) struct FrameInterpreter {
    current_message_id: Option<String>,
}

impl FrameInterpreter {
    pub(crate) fn interpret(&mut self, payload: &str) -> Result<StreamEvent, DecodeError> {
        let frame: WireFrame = serde_json::from_str(payload)?;
        let event = match frame {
            WireFrame::UserMessage { .. } => StreamEvent::UserEchoed,
            WireFrame::AiMessageStart { message_id } => {
                self.current_message_id = Some(message_id.clone());
                StreamEvent::AssistantStart { message_id }
            }
            WireFrame::ContentDelta {
                content,
                message_id,
            } => StreamEvent::ContentDelta {
                message_id: message_id
                    .or_else(|| self.current_message_id.clone())
                    .unwrap_or_default(),
                text: content,
            },
            WireFrame::AiMessageComplete {
                message,
                message_id,
            } => {
                let message_id = message
                    .map(|m| m.id)
                    .or(message_id)
                    .ok_or(DecodeError::MissingMessageId)?;
                StreamEvent::AssistantComplete { message_id }
            }
            WireFrame::ChatName { name } => StreamEvent::TitleAssigned { title: name },
            WireFrame::Error { error } => StreamEvent::StreamError { detail: error },
            WireFrame::StreamComplete => StreamEvent::StreamEnd,
        };
        Ok(event)
    }
}
