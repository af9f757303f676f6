//! Mock implementations for testing
//!
//! These mocks enable session and send testing without real I/O.

use crate::model::{ChatSummary, Conversation, Message};
use crate::transport::{
    Attachment, ByteStream, ChatTransport, MessagePayload, NewChat, Page, SendMessageResponse,
    TransportError, TransportErrorKind, UploadedFile,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One `data:` record, newline-terminated
pub fn sse(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

pub fn summary(id: &str, title: &str) -> ChatSummary {
    ChatSummary {
        id: id.to_string(),
        title: title.to_string(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    }
}

pub fn uploaded(name: &str) -> UploadedFile {
    UploadedFile {
        id: format!("file-{name}"),
        original_name: name.to_string(),
        file_url: format!("https://files.example/{name}"),
        file_size: 4,
        content_type: "application/octet-stream".to_string(),
        processed: true,
        created_at: None,
    }
}

type Chunks = Vec<Result<Bytes, TransportError>>;

/// Scripted response body for `open_message_stream`
struct ScriptedStream {
    chunks: Chunks,
    /// Never close after the chunks, like a stalled connection
    hang: bool,
}

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport that returns queued responses and records every call.
///
/// Empty queues fall back to a plausible default so tests only script
/// what they care about.
#[derive(Default)]
pub struct MockTransport {
    created: Mutex<VecDeque<Result<Conversation, TransportError>>>,
    listings: Mutex<VecDeque<Result<Vec<ChatSummary>, TransportError>>>,
    chats: Mutex<VecDeque<Result<Conversation, TransportError>>>,
    messages: Mutex<VecDeque<Result<Vec<Message>, TransportError>>>,
    replies: Mutex<VecDeque<Result<SendMessageResponse, TransportError>>>,
    streams: Mutex<VecDeque<Result<ScriptedStream, TransportError>>>,
    uploads: Mutex<VecDeque<Result<UploadedFile, TransportError>>>,
    deletions: Mutex<VecDeque<Result<(), TransportError>>>,
    stream_opened: Arc<Notify>,
    next_chat: Mutex<u32>,
    /// Record of all calls made
    pub calls: Mutex<Vec<String>>,
    /// Payloads sent through either send endpoint
    pub payloads: Mutex<Vec<MessagePayload>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_create_chat(&self, result: Result<Conversation, TransportError>) {
        self.created.lock().unwrap().push_back(result);
    }

    pub fn queue_list_chats(&self, result: Result<Vec<ChatSummary>, TransportError>) {
        self.listings.lock().unwrap().push_back(result);
    }

    pub fn queue_get_chat(&self, result: Result<Conversation, TransportError>) {
        self.chats.lock().unwrap().push_back(result);
    }

    pub fn queue_messages(&self, result: Result<Vec<Message>, TransportError>) {
        self.messages.lock().unwrap().push_back(result);
    }

    pub fn queue_send(&self, result: Result<SendMessageResponse, TransportError>) {
        self.replies.lock().unwrap().push_back(result);
    }

    /// Queue a stream that closes after its chunks
    pub fn queue_stream(&self, result: Result<Chunks, TransportError>) {
        self.streams
            .lock()
            .unwrap()
            .push_back(result.map(|chunks| ScriptedStream { chunks, hang: false }));
    }

    /// Queue a stream that stays open after its chunks
    pub fn queue_hanging_stream(&self, chunks: Chunks) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(ScriptedStream { chunks, hang: true }));
    }

    pub fn queue_upload(&self, result: Result<UploadedFile, TransportError>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn queue_delete(&self, result: Result<(), TransportError>) {
        self.deletions.lock().unwrap().push_back(result);
    }

    /// Notified (with a stored permit) each time a stream is opened
    pub fn stream_opened(&self) -> Arc<Notify> {
        Arc::clone(&self.stream_opened)
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn recorded_payloads(&self) -> Vec<MessagePayload> {
        self.payloads.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn not_found(what: &str) -> TransportError {
    TransportError::new(TransportErrorKind::NotFound, format!("No mock {what} queued"))
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn create_chat(&self, request: &NewChat) -> Result<Conversation, TransportError> {
        self.record(format!("create_chat {}", request.title));
        if let Some(result) = self.created.lock().unwrap().pop_front() {
            return result;
        }
        let mut next = self.next_chat.lock().unwrap();
        *next += 1;
        Ok(Conversation::new(
            format!("chat-{}", *next),
            request.title.clone(),
            Utc::now(),
        ))
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, TransportError> {
        self.record("list_chats".to_string());
        self.listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Conversation, TransportError> {
        self.record(format!("get_chat {chat_id}"));
        self.chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(not_found("chat")))
    }

    async fn get_messages(
        &self,
        chat_id: &str,
        page: Page,
    ) -> Result<Vec<Message>, TransportError> {
        self.record(format!(
            "get_messages {chat_id} limit={} offset={}",
            page.limit, page.offset
        ));
        self.messages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_message(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<SendMessageResponse, TransportError> {
        self.record(format!("send_message {chat_id}"));
        self.payloads.lock().unwrap().push(payload.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock response queued")))
    }

    async fn open_message_stream(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<ByteStream, TransportError> {
        self.record(format!("open_message_stream {chat_id}"));
        self.payloads.lock().unwrap().push(payload.clone());
        self.stream_opened.notify_one();
        let scripted = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock stream queued")))?;
        let chunks = futures::stream::iter(scripted.chunks);
        if scripted.hang {
            Ok(chunks.chain(futures::stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }

    async fn upload_file(&self, file: &Attachment) -> Result<UploadedFile, TransportError> {
        self.record(format!("upload_file {}", file.name));
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(uploaded(&file.name)))
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), TransportError> {
        self.record(format!("delete_chat {chat_id}"));
        self.deletions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
