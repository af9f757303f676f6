//! Conversation data model
//!
//! Messages, conversations and the chat-list projection shared by the
//! reducer, the session and the transport.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Who authored a message.
///
/// The server labels assistant messages `bot`; `assistant` is accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "bot", alias = "assistant")]
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "file_name", skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    #[serde(default, rename = "file_url", skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    /// Only true while the assistant is still producing this message.
    /// Never sent by the server.
    #[serde(skip)]
    pub streaming: bool,
}

impl Message {
    pub fn user(
        id: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            created_at,
            attachment_name: None,
            attachment_url: None,
            streaming: false,
        }
    }

    pub fn assistant(
        id: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(id, content, created_at)
        }
    }

    /// Empty assistant placeholder that accumulates streamed content
    pub fn streaming_assistant(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            streaming: true,
            ..Self::assistant(id, String::new(), created_at)
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, name: Option<String>, url: Option<String>) -> Self {
        self.attachment_name = name;
        self.attachment_url = url;
        self
    }
}

/// A conversation as owned by the active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, title: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            updated_at,
        }
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.streaming)
    }

    /// Reduced copy kept in the chat list
    pub fn summary(&self) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Projection of a conversation for list display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ChatSummary {
    /// A conversation shell with no messages loaded
    pub fn to_conversation(&self) -> Conversation {
        Conversation::new(self.id.clone(), self.title.clone(), self.updated_at)
    }
}

/// Ordered set of chat projections keyed by id, most recent first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCollection {
    entries: Vec<ChatSummary>,
}

impl ChatCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a server listing, dropping repeated ids (first wins)
    pub fn from_summaries(summaries: impl IntoIterator<Item = ChatSummary>) -> Self {
        let mut collection = Self::new();
        for summary in summaries {
            if !collection.contains(&summary.id) {
                collection.entries.push(summary);
            }
        }
        collection
    }

    pub fn get(&self, id: &str) -> Option<&ChatSummary> {
        self.entries.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatSummary> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ChatSummary> {
        self.entries.clone()
    }

    /// Insert at the front; an existing entry with the same id is moved
    pub(crate) fn insert_front(&mut self, summary: ChatSummary) {
        self.entries.retain(|c| c.id != summary.id);
        self.entries.insert(0, summary);
    }

    /// Returns the removed entry, if any
    pub(crate) fn remove(&mut self, id: &str) -> Option<ChatSummary> {
        let index = self.entries.iter().position(|c| c.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Overwrite an entry in place. Returns false when the id is unknown.
    pub(crate) fn update(&mut self, summary: ChatSummary) -> bool {
        match self.entries.iter_mut().find(|c| c.id == summary.id) {
            Some(entry) => {
                *entry = summary;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Parse a server timestamp.
///
/// The backend emits ISO-8601 strings that may lack an offset; those are
/// taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}
