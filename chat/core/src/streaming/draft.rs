//! Assistant Message Draft
//!
//! The in-progress assistant message for one ask/answer cycle. Only the
//! assembler mutates it; everything else sees it through shared borrows or
//! owned snapshots.

use serde::{Deserialize, Serialize};

use super::frame::{Frame, SourceRef};
use crate::messages::MessageId;

/// How a frame application went
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The draft changed and is still streaming
    Updated,
    /// The frame ended the cycle
    Finalized,
    /// The draft was already final; nothing changed
    Ignored,
}

/// The live assistant message
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantMessageDraft {
    id: MessageId,
    content: String,
    status: Option<String>,
    sources: Vec<SourceRef>,
    streaming: bool,
    error: Option<String>,
}

impl AssistantMessageDraft {
    /// Create an empty streaming draft
    #[must_use]
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            content: String::new(),
            status: None,
            sources: Vec::new(),
            streaming: true,
            error: None,
        }
    }

    /// Set the label shown before the first frame arrives
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Message id
    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Answer text assembled so far
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Current progress label
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Latest citations
    #[must_use]
    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    /// Whether frames are still being applied
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Error text from a semantic error frame
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether any answer text has arrived
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Apply one frame following the cycle's transition table
    ///
    /// Once the draft is final every frame is ignored.
    pub fn apply(&mut self, frame: Frame) -> Applied {
        if !self.streaming {
            tracing::warn!(
                message_id = %self.id,
                frame = frame.kind(),
                "Frame received after cycle ended, ignoring"
            );
            return Applied::Ignored;
        }

        match frame {
            Frame::Status { text } => {
                self.status = Some(text);
                Applied::Updated
            }
            Frame::Token { text } => {
                self.status = None;
                self.content.push_str(&text);
                Applied::Updated
            }
            Frame::Sources { items } => {
                self.sources = items;
                Applied::Updated
            }
            Frame::Error { message } => {
                self.status = None;
                self.error = Some(message);
                self.streaming = false;
                Applied::Finalized
            }
            Frame::Done => {
                self.status = None;
                self.streaming = false;
                Applied::Finalized
            }
        }
    }

    /// Hand the draft over as a finished message
    ///
    /// A draft still streaming at this point ended without a terminal frame
    /// and is completed implicitly.
    #[must_use]
    pub fn finalize(self) -> FinalMessage {
        let completion = match (&self.error, self.streaming) {
            (Some(_), _) => Completion::Error,
            (None, true) => Completion::Implicit,
            (None, false) => Completion::Done,
        };

        FinalMessage {
            id: self.id,
            content: self.content,
            sources: self.sources,
            error: self.error,
            completion,
        }
    }
}

/// How a cycle reached its end
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// Explicit `done` frame
    Done,
    /// The stream closed without a terminal frame
    Implicit,
    /// Explicit `error` frame
    Error,
}

/// A finalized assistant message, immutable once built
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalMessage {
    /// Message id
    pub id: MessageId,
    /// Answer text
    pub content: String,
    /// Citations from the last sources frame
    pub sources: Vec<SourceRef>,
    /// Error text from a semantic error frame
    pub error: Option<String>,
    /// How the cycle ended
    pub completion: Completion,
}

impl FinalMessage {
    /// Whether the remote reported a semantic error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Text to show in the transcript
    ///
    /// For a semantic error the error is shown after whatever text arrived.
    #[must_use]
    pub fn display_text(&self) -> String {
        match &self.error {
            None => self.content.clone(),
            Some(error) if self.content.is_empty() => format!("Error: {error}"),
            Some(error) => format!("{}\n\nError: {error}", self.content),
        }
    }
}
