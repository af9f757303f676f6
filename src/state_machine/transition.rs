//! Pure state transition function
//!
//! Given the same state, context and event, [`apply`] always produces the
//! same result and performs no I/O. Ignored events leave the state untouched
//! and are reported through [`Effect::Ignored`].

use super::{
    ConversationState, Effect, Event, Interruption, ProtocolError, ReduceContext, StreamStatus,
};
use crate::model::{Conversation, Message};
use crate::stream::StreamEvent;

/// Assistant message appended when a send fails
pub const FAILURE_NOTICE: &str =
    "Sorry, I encountered an error while processing your message. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct Transition {
    pub state: ConversationState,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn new(state: ConversationState) -> Self {
        Self {
            state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn ignored(state: ConversationState, error: ProtocolError) -> Self {
        Self::new(state).with_effect(Effect::Ignored(error))
    }
}

/// Apply one event to the conversation.
pub fn apply(
    mut state: ConversationState,
    context: &ReduceContext,
    event: impl Into<Event>,
) -> Transition {
    match event.into() {
        Event::UserMessage(message) => {
            if state.conversation.message(&message.id).is_some() {
                return Transition::ignored(
                    state,
                    ProtocolError::DuplicateMessage {
                        message_id: message.id,
                    },
                );
            }
            state.conversation.messages.push(message);
            Transition::new(state)
        }

        Event::SendStarted => {
            state.stream = StreamStatus::Open;
            Transition::new(state)
        }

        Event::Stream(event) => apply_stream_event(state, context, event),

        Event::ReplyReceived { reply, title } => {
            if state.stream.is_terminated() {
                return Transition::ignored(
                    state,
                    ProtocolError::AfterTermination {
                        event: "reply_received",
                    },
                );
            }
            finalize_streaming(&mut state.conversation);
            if let Some(reply) = reply {
                if state.conversation.message(&reply.id).is_none() {
                    state.conversation.messages.push(Message {
                        streaming: false,
                        ..reply
                    });
                }
            }
            if let Some(title) = title {
                state.conversation.title = title;
            }
            complete(state, context)
        }

        Event::Interrupted(Interruption::Failed { detail }) => {
            if state.stream.is_terminated() {
                // The stream already reported its own outcome
                finalize_streaming(&mut state.conversation);
                return Transition::new(state);
            }
            fail(state, context, detail)
        }

        Event::Interrupted(Interruption::Cancelled) => {
            finalize_streaming(&mut state.conversation);
            if state.stream.is_terminated() {
                return Transition::new(state);
            }
            state.stream = StreamStatus::Cancelled;
            Transition::new(state).with_effect(Effect::StreamTerminated(StreamStatus::Cancelled))
        }

        Event::Recover => {
            let finalized = finalize_streaming(&mut state.conversation);
            if state.stream == StreamStatus::Open || finalized {
                state.stream = StreamStatus::Cancelled;
                return Transition::new(state)
                    .with_effect(Effect::StreamTerminated(StreamStatus::Cancelled));
            }
            Transition::new(state)
        }
    }
}

/// Apply a complete non-streaming reply as a single transition.
pub fn apply_reply(
    state: ConversationState,
    context: &ReduceContext,
    reply: Option<Message>,
    title: Option<String>,
) -> Transition {
    apply(state, context, Event::ReplyReceived { reply, title })
}

fn apply_stream_event(
    mut state: ConversationState,
    context: &ReduceContext,
    event: StreamEvent,
) -> Transition {
    if state.stream.is_terminated() {
        return Transition::ignored(
            state,
            ProtocolError::AfterTermination {
                event: event.kind(),
            },
        );
    }

    match event {
        StreamEvent::UserEchoed => {
            state.stream = StreamStatus::Open;
            Transition::new(state)
        }

        StreamEvent::AssistantStart { message_id } => {
            if state.conversation.message(&message_id).is_some() {
                return Transition::ignored(state, ProtocolError::DuplicateMessage { message_id });
            }
            finalize_streaming(&mut state.conversation);
            state
                .conversation
                .messages
                .push(Message::streaming_assistant(message_id, context.now));
            state.stream = StreamStatus::Open;
            Transition::new(state)
        }

        StreamEvent::ContentDelta { message_id, text } => {
            let Some(message) = state
                .conversation
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
            else {
                return Transition::ignored(
                    state,
                    ProtocolError::UnknownMessage {
                        event: "content_delta",
                        message_id,
                    },
                );
            };
            if !message.streaming {
                return Transition::ignored(
                    state,
                    ProtocolError::AlreadyFinalized {
                        event: "content_delta",
                        message_id,
                    },
                );
            }
            message.content.push_str(&text);
            state.stream = StreamStatus::Open;
            Transition::new(state)
        }

        StreamEvent::AssistantComplete { message_id } => {
            match state
                .conversation
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
            {
                Some(message) => {
                    message.streaming = false;
                    state.stream = StreamStatus::Open;
                    Transition::new(state)
                }
                None => Transition::ignored(
                    state,
                    ProtocolError::UnknownMessage {
                        event: "assistant_complete",
                        message_id,
                    },
                ),
            }
        }

        StreamEvent::TitleAssigned { title } => {
            state.conversation.title = title;
            state.conversation.updated_at = context.now;
            state.stream = StreamStatus::Open;
            let summary = state.conversation.summary();
            Transition::new(state).with_effect(Effect::SyncChatEntry(summary))
        }

        StreamEvent::StreamError { detail } => fail(state, context, detail),

        StreamEvent::StreamEnd => {
            finalize_streaming(&mut state.conversation);
            complete(state, context)
        }
    }
}

/// Mark the exchange completed and publish the new `updated_at`
fn complete(mut state: ConversationState, context: &ReduceContext) -> Transition {
    state.conversation.updated_at = context.now;
    state.stream = StreamStatus::Completed;
    let summary = state.conversation.summary();
    Transition::new(state)
        .with_effect(Effect::SyncChatEntry(summary))
        .with_effect(Effect::StreamTerminated(StreamStatus::Completed))
}

/// Finalize partial output and append the failure notice
fn fail(mut state: ConversationState, context: &ReduceContext, detail: String) -> Transition {
    finalize_streaming(&mut state.conversation);
    let notice_id = format!("local-error-{}", state.conversation.messages.len());
    state
        .conversation
        .messages
        .push(Message::assistant(notice_id, FAILURE_NOTICE, context.now));
    state.conversation.updated_at = context.now;
    let status = StreamStatus::Failed { detail };
    state.stream = status.clone();
    let summary = state.conversation.summary();
    Transition::new(state)
        .with_effect(Effect::SyncChatEntry(summary))
        .with_effect(Effect::StreamTerminated(status))
}

/// Clear the streaming flag on every message. Returns whether any was set.
fn finalize_streaming(conversation: &mut Conversation) -> bool {
    let mut any = false;
    for message in conversation.messages.iter_mut().filter(|m| m.streaming) {
        message.streaming = false;
        any = true;
    }
    any
}
