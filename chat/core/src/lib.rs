//! RagChat Core - Streaming Answer Client for a RAG Assistant
//!
//! This crate holds the client logic for talking to a retrieval-augmented
//! chat service, independent of any terminal or GUI. Its centre is the
//! [`StreamingAnswerAssembler`], which turns the chunked event stream of an
//! ask request into one growing assistant message.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surface                               │
//! │          (CLI, or anything implementing AssemblerObserver)        │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ on_frame_applied / on_cycle_complete
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                         RAGCHAT CORE                              │
//! │  ┌──────────┐   ┌─────────────┴─────────────┐   ┌──────────────┐  │
//! │  │ Session  │◄──│        ChatClient         │──►│   Backend    │  │
//! │  │ (store)  │   │  StreamingAnswerAssembler │   │ (HTTP / test)│  │
//! │  └──────────┘   └───────────────────────────┘   └──────┬───────┘  │
//! └────────────────────────────────────────────────────────┼──────────┘
//!                                                          │ data: {...}\n
//!                                                   RAG service
//! ```
//!
//! # Key Types
//!
//! - [`StreamingAnswerAssembler`]: Folds one answer stream into a draft
//! - [`AssemblerObserver`]: Receives one callback per applied frame
//! - [`ChatClient`]: Runs a whole ask/answer cycle against a [`Session`]
//! - [`HttpBackend`]: REST and ask-stream client for the service
//!
//! # Quick Start
//!
//! ```ignore
//! use ragchat_core::{load_config, ChatClient, ChannelObserver, HttpBackend, Session};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = load_config()?;
//! let client = ChatClient::new(HttpBackend::new(&config.api)?, config.stream);
//! let mut session = Session::new();
//! client.ensure_chat(&mut session, "What is RAG?").await?;
//!
//! let (mut observer, mut events) = ChannelObserver::channel();
//! let outcome = client
//!     .ask(&mut session, "What is RAG?", &mut observer, &CancellationToken::new())
//!     .await?;
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Ask transport trait and the HTTP service client
//! - [`client`]: Cycle driver tying session, transport and assembler together
//! - [`config`]: TOML/env/CLI configuration
//! - [`error`]: Cycle errors
//! - [`messages`]: Identifiers and events sent to UI surfaces
//! - [`session`]: Transcript store
//! - [`streaming`]: Frame decoding, the draft, and the assembler

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod session;
pub mod streaming;

// Re-exports for convenience
pub use backend::{
    AskTransport, Bot, BotConfig, ByteStream, Chat, Document, HealthStatus, HttpBackend, NewChat,
    TransportError, UploadReceipt,
};
pub use client::ChatClient;
pub use error::ChatError;
pub use messages::{AssemblerEvent, ChatId, DraftSnapshot, MessageId, MessageRole};
pub use session::{ConversationMessage, Session};

// Streaming exports
pub use streaming::{
    Applied, AssemblerObserver, AssistantMessageDraft, ChannelObserver, ChunkProgress,
    Completion, CycleOutcome, FinalMessage, Frame, FrameDecoder, SourceMetadata, SourceRef,
    StreamingAnswerAssembler, TransportFailure,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ApiConfig, ClientConfig, ConfigError,
    ConfigOverrides, ConfigSource, StreamConfig,
};
