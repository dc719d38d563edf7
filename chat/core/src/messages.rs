//! Identifiers and Surface Messages
//!
//! Shared identifier types plus the messages the core sends to UI surfaces
//! while an answer streams in.
//!
//! # Design Philosophy
//!
//! Surfaces are renderers. They receive owned [`AssemblerEvent`] values and
//! never reach into the live draft, so a surface running on another task can
//! re-render from each event without sharing state with the assembler.

use serde::{Deserialize, Serialize};

use crate::streaming::{AssistantMessageDraft, FinalMessage, SourceRef, TransportFailure};

/// Message identifier
///
/// Client-generated and timestamp based, matching the ids the remote service
/// stores alongside each turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Id derived from a Unix timestamp in milliseconds
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    /// Id derived from the current wall-clock time
    #[must_use]
    pub fn now() -> Self {
        Self::from_millis(chrono::Utc::now().timestamp_millis())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat (conversation) identifier assigned by the remote service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    /// Wrap a server-assigned id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// RAG assistant
    Assistant,
}

/// Owned copy of the draft, safe to move across tasks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    /// Draft message id
    pub id: MessageId,
    /// Content assembled so far
    pub content: String,
    /// Current progress label, if any
    pub status: Option<String>,
    /// Latest citations
    pub sources: Vec<SourceRef>,
    /// Whether the draft is still receiving frames
    pub streaming: bool,
}

impl From<&AssistantMessageDraft> for DraftSnapshot {
    fn from(draft: &AssistantMessageDraft) -> Self {
        Self {
            id: draft.id().clone(),
            content: draft.content().to_string(),
            status: draft.status().map(str::to_string),
            sources: draft.sources().to_vec(),
            streaming: draft.is_streaming(),
        }
    }
}

/// Messages from the assembler to a UI surface
///
/// One `FrameApplied` per recognized frame, then exactly one of
/// `CycleComplete` or `TransportFailure`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AssemblerEvent {
    /// A frame changed the draft
    FrameApplied(DraftSnapshot),

    /// The cycle ended (done, implicit completion, or a semantic error)
    CycleComplete(FinalMessage),

    /// The byte stream could not be completed
    TransportFailure(TransportFailure),
}
