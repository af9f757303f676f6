//! reqwest-backed transport against the chat backend
//!
//! The backend keeps the login session in a cookie, so one client (and its
//! cookie store) must be reused for every request of a user session.

use super::{
    Attachment, ByteStream, ChatTransport, MessagePayload, NewChat, Page, SendMessageResponse,
    TransportError, TransportErrorKind, UploadedFile,
};
use crate::auth::{
    ApiResponse, ChatNameRequest, ChatNameResponse, Credentials, HealthStatus, LoginResponse,
    Registration, User,
};
use crate::config::ClientConfig;
use crate::model::{ChatSummary, Conversation, Message};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ChatListResponse {
    #[serde(default)]
    chats: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// Chat backend client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and fail on any non-2xx status
    async fn execute(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = TransportError::from_status(status.as_u16(), error_detail(&body));
        tracing::warn!(status = status.as_u16(), error = %err, "Backend request failed");
        Err(err)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = self.execute(request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let message = format!("Failed to parse response: {e} - body: {body}");
            TransportError::invalid_response(message)
        })
    }

    pub async fn register(
        &self,
        registration: &Registration,
    ) -> Result<ApiResponse, TransportError> {
        registration
            .validate()
            .map_err(|e| TransportError::new(TransportErrorKind::Validation, e.to_string()))?;
        let request = self.client.post(self.url("/auth/register")).json(registration);
        self.fetch_json(request).await
    }

    /// Sign in. The session cookie is kept by this client.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, TransportError> {
        credentials
            .validate()
            .map_err(|e| TransportError::new(TransportErrorKind::Validation, e.to_string()))?;
        let request = self.client.post(self.url("/auth/login")).json(credentials);
        let response: LoginResponse = self.fetch_json(request).await?;
        if !response.success {
            return Err(TransportError::unauthorized(if response.message.is_empty() {
                "Login failed".to_string()
            } else {
                response.message
            }));
        }
        tracing::info!(email = %credentials.email, "Logged in");
        Ok(response)
    }

    pub async fn logout(&self) -> Result<ApiResponse, TransportError> {
        self.fetch_json(self.client.post(self.url("/auth/logout"))).await
    }

    pub async fn current_user(&self) -> Result<User, TransportError> {
        self.fetch_json(self.client.get(self.url("/users/me"))).await
    }

    pub async fn health_check(&self) -> Result<HealthStatus, TransportError> {
        self.fetch_json(self.client.get(self.url("/health"))).await
    }

    pub async fn list_files(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UploadedFile>, TransportError> {
        let request = self
            .client
            .get(self.url("/files"))
            .query(&[("limit", limit), ("offset", offset)]);
        self.fetch_json(request).await
    }

    pub async fn generate_chat_name(
        &self,
        chat_id: &str,
        request: &ChatNameRequest,
    ) -> Result<ChatNameResponse, TransportError> {
        let request = self
            .client
            .post(self.url(&format!("/chats/{chat_id}/name")))
            .json(request);
        self.fetch_json(request).await
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn create_chat(&self, request: &NewChat) -> Result<Conversation, TransportError> {
        let conversation: Conversation = self
            .fetch_json(self.client.post(self.url("/chats")).json(request))
            .await?;
        tracing::info!(chat_id = %conversation.id, "Created chat");
        Ok(conversation)
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, TransportError> {
        let response: ChatListResponse =
            self.fetch_json(self.client.get(self.url("/chats"))).await?;
        Ok(response.chats)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Conversation, TransportError> {
        self.fetch_json(self.client.get(self.url(&format!("/chats/{chat_id}"))))
            .await
    }

    async fn get_messages(
        &self,
        chat_id: &str,
        page: Page,
    ) -> Result<Vec<Message>, TransportError> {
        let request = self
            .client
            .get(self.url(&format!("/chats/{chat_id}/messages")))
            .query(&[("limit", page.limit), ("offset", page.offset)]);
        self.fetch_json(request).await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<SendMessageResponse, TransportError> {
        let request = self
            .client
            .post(self.url(&format!("/chats/{chat_id}/messages")))
            .json(payload);
        self.fetch_json(request).await
    }

    async fn open_message_stream(
        &self,
        chat_id: &str,
        payload: &MessagePayload,
    ) -> Result<ByteStream, TransportError> {
        let request = self
            .client
            .post(self.url(&format!("/chats/{chat_id}/messages/stream")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(payload);
        let response = self.execute(request).await?;
        tracing::debug!(chat_id = %chat_id, "Message stream opened");
        Ok(response
            .bytes_stream()
            .map_err(TransportError::from)
            .boxed())
    }

    async fn upload_file(&self, file: &Attachment) -> Result<UploadedFile, TransportError> {
        let mut part =
            reqwest::multipart::Part::stream(file.data.clone()).file_name(file.name.clone());
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Validation,
                    format!("Invalid content type {content_type}: {e}"),
                )
            })?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);
        let uploaded: UploadedFile = self
            .fetch_json(self.client.post(self.url("/files/upload")).multipart(form))
            .await?;
        tracing::info!(file = %uploaded.original_name, size = uploaded.file_size, "Uploaded file");
        Ok(uploaded)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), TransportError> {
        let _: ApiResponse = self
            .fetch_json(self.client.delete(self.url(&format!("/chats/{chat_id}"))))
            .await?;
        tracing::info!(chat_id = %chat_id, "Deleted chat");
        Ok(())
    }
}

/// Server-provided error text from a JSON `{"detail": ...}` body
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::String(_) | Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Chat not found"}"#).as_deref(),
            Some("Chat not found")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["body", "email"]}]}"#).as_deref(),
            Some(r#"[{"loc":["body","email"]}]"#)
        );
        assert_eq!(error_detail(r#"{"detail": ""}"#), None);
        assert_eq!(error_detail("<html>502</html>"), None);
        assert_eq!(error_detail("{}"), None);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ClientConfig::default().with_api_url("http://backend.test/");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url("/chats"), "http://backend.test/chats");
    }

    #[tokio::test]
    async fn test_login_validates_before_request() {
        // Nothing listens on this port; validation must fail first.
        let config = ClientConfig::default()
            .with_api_url("http://127.0.0.1:9")
            .with_timeout(std::time::Duration::from_secs(2));
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport
            .login(&Credentials::new("not-an-email", "secret"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Validation);
    }

    #[test]
    fn test_chat_list_parses_backend_shape() {
        let json = r#"{
            "chats": [
                {"id": "c1", "title": "Lease", "user_id": "u1",
                 "created_at": "2024-05-01T10:00:00", "updated_at": "2024-05-02T10:00:00.123456"}
            ],
            "total": 1, "limit": 50, "offset": 0
        }"#;
        let parsed: ChatListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.chats.len(), 1);
        assert_eq!(parsed.chats[0].title, "Lease");
    }
}
