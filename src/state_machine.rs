//! Conversation state reducer
//!
//! Every change to the active conversation goes through [`apply`], a pure
//! function from (state, context, event) to a new state plus effects for the
//! caller to carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, ProtocolError};
pub use event::{Event, Interruption};
pub use state::{ConversationState, ReduceContext, StreamStatus};
pub use transition::{apply, apply_reply, Transition, FAILURE_NOTICE};
