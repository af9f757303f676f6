//! Chat backend transport
//!
//! [`ChatTransport`] is the seam between the session logic and the network,
//! so the orchestrator can be driven by a mock in tests.

mod error;
mod http;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;

use crate::model::{ChatSummary, Conversation, Message};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

/// Raw body of a streaming response, chunked however the network delivers it
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Request body for creating a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewChat {
    pub title: String,
}

impl NewChat {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Pagination for message listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Outgoing user message with references to uploaded files
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub content: String,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub metadata: Value,
}

impl MessagePayload {
    /// The first upload is referenced directly; all of them go in `metadata.files`.
    pub fn new(content: impl Into<String>, uploads: &[UploadedFile]) -> Self {
        let first = uploads.first();
        Self {
            content: content.into(),
            file_name: first.map(|f| f.original_name.clone()),
            file_url: first.map(|f| f.file_url.clone()),
            metadata: if uploads.is_empty() {
                json!({})
            } else {
                json!({ "files": uploads })
            },
        }
    }

    /// URLs of every file referenced by this payload
    pub fn file_urls(&self) -> Vec<String> {
        self.metadata
            .get("files")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| f.get("file_url").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Reply to a non-streaming send
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub user_message: Option<Message>,
    #[serde(default)]
    pub ai_response: Option<Message>,
    #[serde(default)]
    pub chat_name: Option<String>,
    #[serde(default)]
    pub processing_time: f64,
}

/// A file waiting to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, named after its final path component.
    ///
    /// The content type is guessed from the extension.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let attachment = Self::new(name, data);
        Ok(match mime_guess::from_path(path).first() {
            Some(mime) => attachment.with_content_type(mime.essence_str()),
            None => attachment,
        })
    }

    /// Lowercased extension including the dot, e.g. `.pdf`
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(format!(".{}", ext.to_ascii_lowercase()))
        }
    }
}

/// Server record of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub id: String,
    pub original_name: String,
    pub file_url: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Operations the session needs from the backend
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn create_chat(&self, request: &NewChat) -> Result<Conversation, TransportError>;

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, TransportError>;

    async fn get_chat(&self, chat_id: &str) -> Result<Conversation, TransportError>;

    async fn get_messages(&self, chat_id: &str, page: Page) -> Result<Vec<Message>, TransportError>;

    /// Send and wait for the complete assistant reply
    async fn send_message(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<SendMessageResponse, TransportError>;

    /// Send and return the raw event stream. Non-2xx responses are errors here,
    /// before any byte is yielded.
    async fn open_message_stream(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<ByteStream, TransportError>;

    async fn upload_file(&self, file: &Attachment) -> Result<UploadedFile, TransportError>;

    async fn delete_chat(&self, chat_id: &str) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn create_chat(&self, request: &NewChat) -> Result<Conversation, TransportError> {
        (**self).create_chat(request).await
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, TransportError> {
        (**self).list_chats().await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Conversation, TransportError> {
        (**self).get_chat(chat_id).await
    }

    async fn get_messages(
        &self,
        chat_id: &str,
        page: Page,
    ) -> Result<Vec<Message>, TransportError> {
        (**self).get_messages(chat_id, page).await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<SendMessageResponse, TransportError> {
        (**self).send_message(chat_id, payload).await
    }

    async fn open_message_stream(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<ByteStream, TransportError> {
        (**self).open_message_stream(chat_id, payload).await
    }

    async fn upload_file(&self, file: &Attachment) -> Result<UploadedFile, TransportError> {
        (**self).upload_file(file).await
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), TransportError> {
        (**self).delete_chat(chat_id).await
    }
}
