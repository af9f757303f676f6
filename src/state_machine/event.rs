//! Events that drive the conversation reducer

use crate::model::Message;
use crate::stream::StreamEvent;

/// Why a send stopped before the stream ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    /// Transport failure or any other error not reported by the stream itself
    Failed { detail: String },
    /// Caller cancelled the send
    Cancelled,
}

/// Input to a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Optimistic insert of the user's outgoing message
    UserMessage(Message),
    /// A new exchange begins; the stream status is reset to open
    SendStarted,
    /// A decoded record from the response stream
    Stream(StreamEvent),
    /// Complete reply from a non-streaming send
    ReplyReceived {
        reply: Option<Message>,
        title: Option<String>,
    },
    Interrupted(Interruption),
    /// Finalize anything left streaming by a send that never finished
    Recover,
}

impl From<StreamEvent> for Event {
    fn from(event: StreamEvent) -> Self {
        Event::Stream(event)
    }
}
