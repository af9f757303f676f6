//! Chat session state and chat management

use super::orchestrator::SendPhase;
use crate::config::ClientConfig;
use crate::model::{ChatCollection, ChatSummary, Conversation};
use crate::state_machine::{apply, ConversationState, Effect, Event, ReduceContext, StreamStatus};
use crate::sync::{apply_change, ChatListChange};
use crate::transcript::Transcript;
use crate::transport::{ChatTransport, NewChat, Page, TransportError};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Title for chats created from the chat list
pub const NEW_CHAT_TITLE: &str = "New Legal Consultation";

/// Change published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Snapshot of the active conversation after a change
    Conversation(Conversation),
    /// No conversation is active anymore
    ActiveCleared,
    /// Snapshot of the chat list after a change
    Chats(Vec<ChatSummary>),
    Phase(SendPhase),
}

/// A signed-in user's chats and the conversation currently open.
///
/// All mutation goes through `&mut self`, so operations on one session never
/// interleave. Share it between tasks behind a `tokio::sync::Mutex`.
pub struct ChatSession<T> {
    pub(super) transport: T,
    pub(super) streaming: bool,
    pub(super) chats: ChatCollection,
    pub(super) active: Option<ConversationState>,
    pub(super) cancel: CancellationToken,
    phase: SendPhase,
    updates: broadcast::Sender<SessionUpdate>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        let (updates, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            transport,
            streaming: config.streaming,
            chats: ChatCollection::new(),
            active: None,
            cancel: CancellationToken::new(),
            phase: SendPhase::Idle,
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Subscription as a stream. Updates a lagging subscriber missed are skipped.
    pub fn updates(&self) -> impl Stream<Item = SessionUpdate> + Send + 'static {
        BroadcastStream::new(self.updates.subscribe()).filter_map(|result| match result {
            Ok(update) => Some(update),
            Err(_) => None,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn chats(&self) -> &ChatCollection {
        &self.chats
    }

    pub fn active(&self) -> Option<&ConversationState> {
        self.active.as_ref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.as_ref().map(|s| &s.conversation)
    }

    /// Phase of the last send, `Idle` before the first one
    pub fn phase(&self) -> &SendPhase {
        &self.phase
    }

    /// Token that cancels the send in progress, or the next one if none is
    /// running. A fresh token is issued once a cancellation has been consumed.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Refresh the chat list. A failed listing leaves the list empty.
    pub async fn load_chats(&mut self) -> &ChatCollection {
        self.recover_interrupted();
        match self.transport.list_chats().await {
            Ok(chats) => {
                tracing::info!(count = chats.len(), "Loaded chats");
                self.chats = ChatCollection::from_summaries(chats);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load chats");
                self.chats = ChatCollection::new();
            }
        }
        self.publish_chats();
        &self.chats
    }

    /// Create a chat, put it first in the list and make it active
    pub async fn new_chat(&mut self) -> Result<Conversation, TransportError> {
        self.recover_interrupted();
        let conversation = self
            .transport
            .create_chat(&NewChat::titled(NEW_CHAT_TITLE))
            .await?;
        self.activate(conversation.clone(), true);
        Ok(conversation)
    }

    /// Open a chat with its message history.
    ///
    /// When the history cannot be fetched, the listed projection is opened
    /// without messages; only an unlisted chat that fails to load is an error.
    pub async fn select_chat(&mut self, chat_id: &str) -> Result<Conversation, TransportError> {
        self.recover_interrupted();
        let conversation = match self.fetch_conversation(chat_id).await {
            Ok(conversation) => conversation,
            Err(e) => match self.chats.get(chat_id) {
                Some(summary) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Failed to load chat, opening without history");
                    summary.to_conversation()
                }
                None => return Err(e),
            },
        };
        self.activate(conversation.clone(), false);
        Ok(conversation)
    }

    async fn fetch_conversation(&self, chat_id: &str) -> Result<Conversation, TransportError> {
        let mut conversation = self.transport.get_chat(chat_id).await?;
        conversation.messages = self.transport.get_messages(chat_id, Page::default()).await?;
        Ok(conversation)
    }

    /// Delete a chat remotely, then drop it from the list
    pub async fn delete_chat(&mut self, chat_id: &str) -> Result<(), TransportError> {
        self.recover_interrupted();
        self.transport.delete_chat(chat_id).await?;

        let active_id = self.active.as_ref().map(|s| s.id().to_string());
        let outcome = apply_change(
            &mut self.chats,
            active_id.as_deref(),
            ChatListChange::Deleted {
                chat_id: chat_id.to_string(),
            },
        );
        if outcome.clear_active {
            self.active = None;
            self.publish(SessionUpdate::ActiveCleared);
        }
        if outcome.changed {
            self.publish_chats();
        }
        Ok(())
    }

    /// Forget all chats, as on logout
    pub fn reset(&mut self) {
        self.chats.clear();
        self.active = None;
        self.publish(SessionUpdate::ActiveCleared);
        self.publish_chats();
    }

    /// Renderer-neutral export of the active conversation
    pub fn export_transcript(&self) -> Option<Transcript> {
        self.active_conversation()
            .map(|c| Transcript::from_conversation(c, Utc::now()))
    }

    /// Finalize a stream left open by a send whose future was dropped
    pub fn recover_interrupted(&mut self) {
        let interrupted = self
            .active
            .as_ref()
            .is_some_and(|s| s.stream == StreamStatus::Open || s.has_streaming_message());
        if interrupted {
            tracing::warn!("Recovering conversation from an interrupted send");
            self.reduce(&ReduceContext::now(), Event::Recover);
        }
    }

    pub(super) fn activate(&mut self, conversation: Conversation, created: bool) {
        if created {
            apply_change(
                &mut self.chats,
                None,
                ChatListChange::Created(conversation.summary()),
            );
            self.publish_chats();
        }
        tracing::debug!(chat_id = %conversation.id, "Activated chat");
        self.publish(SessionUpdate::Conversation(conversation.clone()));
        self.active = Some(ConversationState::new(conversation));
    }

    /// Run one event through the reducer and carry out its effects.
    ///
    /// Returns the effects for the caller to inspect. No-op without an
    /// active conversation.
    pub(super) fn reduce(
        &mut self,
        context: &ReduceContext,
        event: impl Into<Event>,
    ) -> Vec<Effect> {
        let Some(state) = self.active.take() else {
            return Vec::new();
        };
        let transition = apply(state, context, event);
        let chat_id = transition.state.id().to_string();
        self.active = Some(transition.state);

        let mut chats_changed = false;
        for effect in &transition.effects {
            if let Some(change) = ChatListChange::from_effect(effect) {
                chats_changed |= apply_change(&mut self.chats, Some(&chat_id), change).changed;
            }
            match effect {
                Effect::StreamTerminated(status) => {
                    tracing::debug!(chat_id = %chat_id, status = ?status, "Stream terminated");
                }
                Effect::Ignored(error) => {
                    tracing::warn!(chat_id = %chat_id, error = %error, "Ignoring stream event");
                }
                Effect::SyncChatEntry(_) => {}
            }
        }

        if let Some(conversation) = self.active_conversation() {
            let snapshot = conversation.clone();
            self.publish(SessionUpdate::Conversation(snapshot));
        }
        if chats_changed {
            self.publish_chats();
        }
        transition.effects
    }

    pub(super) fn publish_phase(&mut self, phase: SendPhase) {
        tracing::debug!(phase = ?phase, "Send phase");
        self.phase = phase.clone();
        self.publish(SessionUpdate::Phase(phase));
    }

    fn publish_chats(&self) {
        self.publish(SessionUpdate::Chats(self.chats.to_vec()));
    }

    fn publish(&self, update: SessionUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}
