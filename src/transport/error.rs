//! Transport error types

use thiserror::Error;

/// Failure talking to the chat backend, with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unauthorized, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidResponse, message)
    }

    /// Classify a non-2xx response. `detail` is the server's error text, if any.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let kind = match status {
            401 => TransportErrorKind::Unauthorized,
            403 => TransportErrorKind::Forbidden,
            404 => TransportErrorKind::NotFound,
            400 | 409 | 422 => TransportErrorKind::Validation,
            500..=599 => TransportErrorKind::Server,
            _ => TransportErrorKind::InvalidResponse,
        };
        let message = detail.unwrap_or_else(|| format!("HTTP {status}"));
        Self::new(kind, message).with_status(status)
    }

    /// Text suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self.kind {
            TransportErrorKind::Forbidden => {
                "Access denied. Please check your permissions.".to_string()
            }
            TransportErrorKind::NotFound => "Resource not found.".to_string(),
            TransportErrorKind::Server => "Server error. Please try again later.".to_string(),
            _ if self.message.is_empty() => "An unexpected error occurred.".to_string(),
            _ => self.message.clone(),
        }
    }

    /// Whether the session is gone and the user must sign in again
    pub fn requires_login(&self) -> bool {
        self.kind == TransportErrorKind::Unauthorized
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            TransportError::network(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            TransportError::invalid_response(format!("Failed to parse response: {e}"))
        } else if let Some(status) = e.status() {
            TransportError::from_status(status.as_u16(), Some(e.to_string()))
        } else {
            TransportError::network(format!("Request failed: {e}"))
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection failures and broken streams
    Network,
    /// Client-side timeout; handled like any other transport failure
    Timeout,
    /// 401, or a login the server refused
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// Request rejected as invalid (400, 409, 422)
    Validation,
    /// 5xx
    Server,
    /// Unexpected status or unparseable body
    InvalidResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert_eq!(TransportError::from_status(401, None).kind, TransportErrorKind::Unauthorized);
        assert_eq!(TransportError::from_status(403, None).kind, TransportErrorKind::Forbidden);
        assert_eq!(TransportError::from_status(404, None).kind, TransportErrorKind::NotFound);
        assert_eq!(TransportError::from_status(422, None).kind, TransportErrorKind::Validation);
        assert_eq!(TransportError::from_status(503, None).kind, TransportErrorKind::Server);
        assert_eq!(
            TransportError::from_status(302, None).kind,
            TransportErrorKind::InvalidResponse
        );
    }

    #[test]
    fn test_status_message_fallback() {
        let err = TransportError::from_status(418, None);
        assert_eq!(err.message, "HTTP 418");
        assert_eq!(err.status, Some(418));
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            TransportError::from_status(404, Some("Chat not found".into())).user_message(),
            "Resource not found."
        );
        assert_eq!(
            TransportError::from_status(500, None).user_message(),
            "Server error. Please try again later."
        );
        assert_eq!(
            TransportError::from_status(400, Some("Email already registered".into()))
                .user_message(),
            "Email already registered"
        );
        assert_eq!(
            TransportError::network("").user_message(),
            "An unexpected error occurred."
        );
        assert!(TransportError::from_status(401, None).requires_login());
    }
}
