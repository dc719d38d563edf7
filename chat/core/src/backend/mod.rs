//! RAG Service Integration
//!
//! The ask stream is reached through the [`AskTransport`] trait so the answer
//! cycle can run against the HTTP service or a scripted stream. Everything
//! else the service offers (chats, bots, documents) lives on [`HttpBackend`].
//!
//! # Usage
//!
//! ```ignore
//! use ragchat_core::backend::{AskTransport, HttpBackend};
//! use ragchat_core::config::ApiConfig;
//!
//! let backend = HttpBackend::new(&ApiConfig::default())?;
//! let chats = backend.list_chats().await?;
//! let stream = backend.open_ask_stream(&chat_id, "What is RAG?").await?;
//! ```

mod http;
mod traits;
mod types;

pub use http::{HttpBackend, USER_ID_HEADER};
pub use traits::{AskTransport, ByteStream, TransportError};
pub use types::{
    Bot, BotConfig, BotProfile, Chat, ChatUpdate, Document, HealthStatus, NewChat, StoredMessage,
    UploadReceipt,
};
