//! Chat list synchronization
//!
//! Keeps the chat collection consistent with the conversations it projects.

use crate::model::{ChatCollection, ChatSummary};
use crate::state_machine::Effect;

/// A chat-level change to mirror into the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatListChange {
    Created(ChatSummary),
    Deleted { chat_id: String },
    /// Title or `updated_at` changed
    Updated(ChatSummary),
}

impl ChatListChange {
    /// The list change requested by a reducer effect, if any
    pub fn from_effect(effect: &Effect) -> Option<Self> {
        match effect {
            Effect::SyncChatEntry(summary) => Some(ChatListChange::Updated(summary.clone())),
            _ => None,
        }
    }
}

/// What the caller must do after a change was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    /// The collection was modified
    pub changed: bool,
    /// The active conversation was deleted and must be cleared
    pub clear_active: bool,
}

/// Apply a change to the collection.
///
/// `active_id` is the id of the conversation currently open, if any.
pub fn apply_change(
    chats: &mut ChatCollection,
    active_id: Option<&str>,
    change: ChatListChange,
) -> SyncOutcome {
    match change {
        ChatListChange::Created(summary) => {
            chats.insert_front(summary);
            SyncOutcome {
                changed: true,
                clear_active: false,
            }
        }
        ChatListChange::Deleted { chat_id } => {
            let changed = chats.remove(&chat_id).is_some();
            SyncOutcome {
                changed,
                clear_active: active_id == Some(chat_id.as_str()),
            }
        }
        ChatListChange::Updated(summary) => {
            if chats.get(&summary.id) == Some(&summary) {
                return SyncOutcome::default();
            }
            let id = summary.id.clone();
            if !chats.update(summary.clone()) {
                // Not listed yet (the listing failed or predates the chat)
                tracing::debug!(chat_id = %id, "Adding unlisted chat to the list");
                chats.insert_front(summary);
            }
            SyncOutcome {
                changed: true,
                clear_active: false,
            }
        }
    }
}
