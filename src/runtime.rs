//! Chat session runtime
//!
//! [`ChatSession`] owns the chat list and the active conversation, drives
//! sends through the reducer and publishes every change to subscribers.

mod orchestrator;
mod session;

#[cfg(test)]
pub mod testing;

pub use orchestrator::{
    check_attachment, SendError, SendMode, SendOutcome, SendPhase, SendReport, UploadError,
    ACCEPTED_EXTENSIONS,
};
pub use session::{ChatSession, SessionUpdate, NEW_CHAT_TITLE};
