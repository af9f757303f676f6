//! lexchat - streaming chat client core for a legal-assistant backend
//!
//! The interesting part is the send path: a chunked event stream is decoded
//! ([`stream`]), folded into the active conversation by a pure reducer
//! ([`state_machine`]) and published to subscribers by the session
//! ([`runtime`]), which keeps the chat list in step ([`sync`]).

pub mod auth;
pub mod config;
pub mod model;
pub mod runtime;
pub mod state_machine;
pub mod stream;
pub mod sync;
pub mod transcript;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use runtime::{ChatSession, SendOutcome, SendReport, SessionUpdate};
pub use transport::{ChatTransport, HttpTransport, TransportError};
