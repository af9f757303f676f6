//! Send orchestration
//!
//! One send runs through fixed phases: make sure a chat exists, insert the
//! user's message optimistically, upload attachments, then stream (or await)
//! the reply. Once the user message is inserted the send always resolves
//! with a [`SendReport`]; failures become a notice in the conversation.

use super::session::ChatSession;
use crate::model::Message;
use crate::state_machine::{Effect, Event, Interruption, ReduceContext, StreamStatus};
use crate::stream::{decode_events, StreamEvent};
use crate::transport::{
    Attachment, ChatTransport, MessagePayload, NewChat, TransportError, UploadedFile,
};
use futures::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// File extensions the backend accepts
pub const ACCEPTED_EXTENSIONS: [&str; 4] = [".pdf", ".doc", ".docx", ".txt"];

/// Title of a chat created implicitly by a send
const IMPLICIT_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Consume the reply as an event stream
    Streaming,
    /// Wait for the complete reply
    Batch,
}

/// Progress of a send, published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    ChatEnsured,
    OptimisticInserted,
    Uploading,
    StreamOpen,
    Draining,
    Terminal(SendOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    Failed { detail: String },
    Cancelled,
}

/// Reasons a send is refused before anything changes
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Failed to create chat: {0}")]
    ChatCreation(#[source] TransportError),
}

/// An attachment that was left out of the message
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error("{name}: unsupported file type (accepted: .pdf, .doc, .docx, .txt)")]
    UnsupportedType { name: String },
    #[error("{name}: upload failed: {source}")]
    Transport {
        name: String,
        #[source]
        source: TransportError,
    },
}

/// Summary of a finished send
#[derive(Debug, Clone)]
pub struct SendReport {
    pub chat_id: String,
    /// Local id of the optimistically inserted user message
    pub user_message_id: String,
    pub created_chat: bool,
    pub outcome: SendOutcome,
    pub uploaded: Vec<UploadedFile>,
    pub upload_failures: Vec<UploadError>,
    /// Stream events the reducer refused
    pub ignored_events: usize,
}

/// Reject attachments the backend would refuse
pub fn check_attachment(attachment: &Attachment) -> Result<(), UploadError> {
    match attachment.extension() {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(UploadError::UnsupportedType {
            name: attachment.name.clone(),
        }),
    }
}

impl<T: ChatTransport> ChatSession<T> {
    /// Send a message in the configured mode
    pub async fn send(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendReport, SendError> {
        let mode = if self.streaming {
            SendMode::Streaming
        } else {
            SendMode::Batch
        };
        self.send_with_mode(text, attachments, mode).await
    }

    pub async fn send_with_mode(
        &mut self,
        text: &str,
        attachments: Vec<Attachment>,
        mode: SendMode,
    ) -> Result<SendReport, SendError> {
        // The backend requires message text even when files are attached
        let content = text.trim();
        if content.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        self.recover_interrupted();
        let cancel = self.cancel.clone();

        let created_chat = self.active.is_none();
        let chat_id = self.ensure_chat().await?;
        self.publish_phase(SendPhase::ChatEnsured);

        let context = ReduceContext::now();
        let user_message_id = format!("local-{}", uuid::Uuid::new_v4());
        let message = Message::user(&user_message_id, content, context.now)
            .with_attachment(attachments.first().map(|a| a.name.clone()), None);
        self.reduce(&context, Event::UserMessage(message));
        self.reduce(&context, Event::SendStarted);
        self.publish_phase(SendPhase::OptimisticInserted);

        let mut report = SendReport {
            chat_id: chat_id.clone(),
            user_message_id,
            created_chat,
            outcome: SendOutcome::Completed,
            uploaded: Vec::new(),
            upload_failures: Vec::new(),
            ignored_events: 0,
        };

        let interim = if self.upload_all(&attachments, &cancel, &mut report).await {
            let payload = MessagePayload::new(content, &report.uploaded);
            match mode {
                SendMode::Streaming => {
                    self.drain_stream(&chat_id, &payload, &cancel, &mut report)
                        .await
                }
                SendMode::Batch => self.await_reply(&chat_id, &payload, &cancel).await,
            }
        } else {
            SendOutcome::Cancelled
        };

        report.outcome = self.finish(interim);
        match &report.outcome {
            SendOutcome::Completed => {
                tracing::info!(chat_id = %chat_id, ignored = report.ignored_events, "Send completed");
            }
            SendOutcome::Failed { detail } => {
                tracing::error!(chat_id = %chat_id, error = %detail, "Send failed");
            }
            SendOutcome::Cancelled => tracing::info!(chat_id = %chat_id, "Send cancelled"),
        }
        self.publish_phase(SendPhase::Terminal(report.outcome.clone()));
        if cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        Ok(report)
    }

    /// Id of the active chat, creating one if needed. Nothing changes on failure.
    async fn ensure_chat(&mut self) -> Result<String, SendError> {
        if let Some(state) = &self.active {
            return Ok(state.id().to_string());
        }
        let conversation = self
            .transport
            .create_chat(&NewChat::titled(IMPLICIT_CHAT_TITLE))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create chat for send");
                SendError::ChatCreation(e)
            })?;
        let chat_id = conversation.id.clone();
        self.activate(conversation, true);
        Ok(chat_id)
    }

    /// Upload attachments one at a time. Failures are recorded and skipped.
    /// Returns false if cancelled.
    async fn upload_all(
        &mut self,
        attachments: &[Attachment],
        cancel: &CancellationToken,
        report: &mut SendReport,
    ) -> bool {
        if attachments.is_empty() {
            return true;
        }
        self.publish_phase(SendPhase::Uploading);

        for attachment in attachments {
            if let Err(e) = check_attachment(attachment) {
                tracing::warn!(file = %attachment.name, error = %e, "Skipping attachment");
                report.upload_failures.push(e);
                continue;
            }
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                result = self.transport.upload_file(attachment) => result,
            };
            match result {
                Ok(uploaded) => report.uploaded.push(uploaded),
                Err(e) => {
                    tracing::warn!(file = %attachment.name, error = %e, "Attachment upload failed");
                    report.upload_failures.push(UploadError::Transport {
                        name: attachment.name.clone(),
                        source: e,
                    });
                }
            }
        }
        true
    }

    async fn drain_stream(
        &mut self,
        chat_id: &str,
        payload: &MessagePayload,
        cancel: &CancellationToken,
        report: &mut SendReport,
    ) -> SendOutcome {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return SendOutcome::Cancelled,
            opened = self.transport.open_message_stream(chat_id, payload) => opened,
        };
        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => return SendOutcome::Failed { detail: e.to_string() },
        };
        self.publish_phase(SendPhase::StreamOpen);

        let mut events = std::pin::pin!(decode_events(bytes));
        let mut draining = false;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return SendOutcome::Cancelled,
                next = events.next() => next,
            };
            match next {
                Some(Ok(event)) => {
                    if !draining {
                        draining = true;
                        self.publish_phase(SendPhase::Draining);
                    }
                    let terminal = event.is_terminal();
                    let effects = self.reduce(&ReduceContext::now(), event);
                    report.ignored_events += effects
                        .iter()
                        .filter(|e| matches!(e, Effect::Ignored(_)))
                        .count();
                    if terminal {
                        return SendOutcome::Completed;
                    }
                }
                Some(Err(e)) => return SendOutcome::Failed { detail: e.to_string() },
                // Closed without a terminal frame
                None => return SendOutcome::Completed,
            }
        }
    }

    async fn await_reply(
        &mut self,
        chat_id: &str,
        payload: &MessagePayload,
        cancel: &CancellationToken,
    ) -> SendOutcome {
        self.publish_phase(SendPhase::StreamOpen);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return SendOutcome::Cancelled,
            result = self.transport.send_message(chat_id, payload) => result,
        };
        match result {
            Ok(response) => {
                tracing::debug!(
                    chat_id = %chat_id,
                    processing_time = response.processing_time,
                    "Received reply"
                );
                self.reduce(
                    &ReduceContext::now(),
                    Event::ReplyReceived {
                        reply: response.ai_response,
                        title: response.chat_name,
                    },
                );
                SendOutcome::Completed
            }
            Err(e) => SendOutcome::Failed { detail: e.to_string() },
        }
    }

    /// Bring the conversation to a terminal state and report how it ended
    fn finish(&mut self, interim: SendOutcome) -> SendOutcome {
        let context = ReduceContext::now();
        let event = match interim {
            SendOutcome::Completed => Event::Stream(StreamEvent::StreamEnd),
            SendOutcome::Failed { detail } => Event::Interrupted(Interruption::Failed { detail }),
            SendOutcome::Cancelled => Event::Interrupted(Interruption::Cancelled),
        };
        let still_open = self
            .active
            .as_ref()
            .is_some_and(|s| !s.stream.is_terminated());
        if still_open || !matches!(event, Event::Stream(_)) {
            self.reduce(&context, event);
        }

        match self.active.as_ref().map(|s| &s.stream) {
            Some(StreamStatus::Failed { detail }) => SendOutcome::Failed {
                detail: detail.clone(),
            },
            Some(StreamStatus::Cancelled) => SendOutcome::Cancelled,
            _ => SendOutcome::Completed,
        }
    }
}
