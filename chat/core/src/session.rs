//! Session Management
//!
//! The client-side view of one chat: its settings and the transcript the UI
//! renders.
//!
//! # Design Philosophy
//!
//! The transcript is a store. During an answer cycle it holds a placeholder
//! for the assistant turn and mirrors the live draft into it after every
//! frame; it never mutates the draft itself. When the cycle ends the store
//! either commits the final message or rolls the turn back.

use serde::{Deserialize, Serialize};

use crate::backend::{Chat, StoredMessage};
use crate::error::ChatError;
use crate::messages::{ChatId, MessageId, MessageRole};
use crate::streaming::{AssistantMessageDraft, FinalMessage, SourceRef, TransportFailure};

/// A message in the transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// When the message was created (Unix timestamp ms)
    pub timestamp: i64,
    /// Progress label while the answer is being prepared
    pub status: Option<String>,
    /// Citations for assistant turns
    pub sources: Vec<SourceRef>,
    /// Whether the message is still being streamed
    pub streaming: bool,
    /// Whether the stream broke before the answer finished
    pub failed: bool,
}

impl ConversationMessage {
    fn user(id: MessageId, content: String, timestamp: i64) -> Self {
        Self {
            id,
            role: MessageRole::User,
            content,
            timestamp,
            status: None,
            sources: Vec::new(),
            streaming: false,
            failed: false,
        }
    }

    fn placeholder(id: MessageId, status: Option<String>, timestamp: i64) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            content: String::new(),
            timestamp,
            status,
            sources: Vec::new(),
            streaming: true,
            failed: false,
        }
    }

    fn from_stored(stored: &StoredMessage) -> Self {
        let timestamp = stored
            .timestamp
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map_or(0, |t| t.timestamp_millis());

        Self {
            id: stored.id.clone(),
            role: stored.role,
            content: stored.content.clone(),
            timestamp,
            status: None,
            sources: stored.sources.clone(),
            streaming: false,
            failed: false,
        }
    }
}

/// Ids of the two turns of the cycle in progress
#[derive(Clone, Debug, PartialEq, Eq)]
struct Cycle {
    user: MessageId,
    assistant: MessageId,
}

/// A chat and its transcript
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned chat id; `None` until the chat is created
    pub chat_id: Option<ChatId>,
    /// Chat title
    pub title: String,
    /// Bot answering in this chat
    pub bot_id: Option<String>,
    /// Documents used as retrieval context
    selected_documents: Vec<String>,
    /// Conversation history
    pub messages: Vec<ConversationMessage>,
    /// Turns of the cycle in progress
    #[serde(skip)]
    current_cycle: Option<Cycle>,
    /// Last millisecond handed out as a message id
    #[serde(skip)]
    last_id_ms: i64,
}

impl Session {
    /// Create an empty, unsaved session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session bound to an existing chat
    #[must_use]
    pub fn with_chat_id(chat_id: ChatId) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::default()
        }
    }

    /// Load a stored chat
    #[must_use]
    pub fn from_chat(chat: &Chat) -> Self {
        Self {
            chat_id: Some(ChatId::new(chat.id.clone())),
            title: chat.title.clone(),
            bot_id: chat.bot_id.clone(),
            selected_documents: chat.selected_documents.clone(),
            messages: chat.messages.iter().map(ConversationMessage::from_stored).collect(),
            current_cycle: None,
            last_id_ms: 0,
        }
    }

    /// Documents used as retrieval context
    #[must_use]
    pub fn selected_documents(&self) -> &[String] {
        &self.selected_documents
    }

    /// Select `doc_id` if unselected, unselect it otherwise
    ///
    /// Returns the new selection.
    pub fn toggle_document(&mut self, doc_id: &str) -> &[String] {
        if let Some(pos) = self.selected_documents.iter().position(|d| d == doc_id) {
            self.selected_documents.remove(pos);
        } else {
            self.selected_documents.push(doc_id.to_string());
        }
        &self.selected_documents
    }

    /// Check if an answer is streaming
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.current_cycle.is_some()
    }

    /// Id of the assistant turn being streamed
    #[must_use]
    pub fn streaming_message_id(&self) -> Option<&MessageId> {
        self.current_cycle.as_ref().map(|c| &c.assistant)
    }

    /// Get message by ID
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Get all messages
    #[must_use]
    pub fn all_messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Append the user turn and a streaming assistant placeholder
    ///
    /// Returns the ids of both turns. The assistant id is one millisecond
    /// after the user id.
    ///
    /// # Errors
    ///
    /// [`ChatError::EmptyQuestion`] for a blank question,
    /// [`ChatError::CycleInProgress`] while another answer is streaming.
    pub fn begin_cycle(
        &mut self,
        question: &str,
        initial_status: Option<&str>,
    ) -> Result<(MessageId, MessageId), ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        if self.is_streaming() {
            return Err(ChatError::CycleInProgress);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let ms = now.max(self.last_id_ms + 1);
        self.last_id_ms = ms + 1;

        let user = MessageId::from_millis(ms);
        let assistant = MessageId::from_millis(ms + 1);

        self.messages
            .push(ConversationMessage::user(user.clone(), question.to_string(), now));
        self.messages.push(ConversationMessage::placeholder(
            assistant.clone(),
            initial_status.map(str::to_string),
            now,
        ));
        self.current_cycle = Some(Cycle {
            user: user.clone(),
            assistant: assistant.clone(),
        });

        tracing::debug!(user_id = %user, assistant_id = %assistant, "Cycle started");
        Ok((user, assistant))
    }

    fn assistant_turn_mut(&mut self, id: &MessageId) -> Result<&mut ConversationMessage, ChatError> {
        match self.current_cycle {
            Some(ref cycle) if &cycle.assistant == id => self
                .messages
                .iter_mut()
                .find(|m| &m.id == id)
                .ok_or(ChatError::NoAssistantTurn),
            _ => Err(ChatError::NoAssistantTurn),
        }
    }

    /// Mirror the live draft into the assistant placeholder
    ///
    /// # Errors
    ///
    /// [`ChatError::NoAssistantTurn`] if the draft does not belong to the
    /// cycle in progress.
    pub fn sync_draft(&mut self, draft: &AssistantMessageDraft) -> Result<(), ChatError> {
        let turn = self.assistant_turn_mut(draft.id())?;
        draft.content().clone_into(&mut turn.content);
        turn.status = draft.status().map(str::to_string);
        draft.sources().clone_into(&mut turn.sources);
        turn.streaming = draft.is_streaming();
        Ok(())
    }

    /// Commit the finished answer
    ///
    /// A semantic error is shown after whatever text arrived.
    ///
    /// # Errors
    ///
    /// [`ChatError::NoAssistantTurn`] if `message` does not belong to the
    /// cycle in progress.
    pub fn complete_cycle(
        &mut self,
        message: &FinalMessage,
    ) -> Result<&ConversationMessage, ChatError> {
        let index = {
            let turn = self.assistant_turn_mut(&message.id)?;
            turn.content = message.display_text();
            turn.status = None;
            message.sources.clone_into(&mut turn.sources);
            turn.streaming = false;
            turn.id.clone()
        };
        self.current_cycle = None;
        self.get_message(&index).ok_or(ChatError::NoAssistantTurn)
    }

    /// Settle the cycle after the byte stream broke
    ///
    /// Partial text is kept, marked failed, and followed by the failure
    /// reason. Without text the placeholder is removed, and the user turn too
    /// if the stream never opened.
    pub fn fail_cycle(&mut self, failure: &TransportFailure) {
        let Some(cycle) = self.current_cycle.take() else {
            return;
        };

        if failure.had_partial_content {
            if let Some(turn) = self.messages.iter_mut().find(|m| m.id == cycle.assistant) {
                turn.content = format!("{}\n\nError: {}", turn.content, failure.reason);
                turn.status = None;
                turn.streaming = false;
                turn.failed = true;
            }
        } else {
            self.roll_back(&cycle, failure.stream_opened);
        }
    }

    /// Settle the cycle after the caller cancelled it
    ///
    /// Same rollback rules as [`fail_cycle`](Self::fail_cycle), but kept text
    /// is not marked failed.
    pub fn abandon_cycle(&mut self, stream_opened: bool) {
        let Some(cycle) = self.current_cycle.take() else {
            return;
        };

        let kept = self
            .messages
            .iter_mut()
            .find(|m| m.id == cycle.assistant && !m.content.is_empty())
            .map(|turn| {
                turn.status = None;
                turn.streaming = false;
            })
            .is_some();

        if !kept {
            self.roll_back(&cycle, stream_opened);
        }
    }

    fn roll_back(&mut self, cycle: &Cycle, stream_opened: bool) {
        self.messages.retain(|m| {
            m.id != cycle.assistant && (stream_opened || m.id != cycle.user)
        });
        tracing::debug!(
            assistant_id = %cycle.assistant,
            removed_user_turn = !stream_opened,
            "Cycle rolled back"
        );
    }
}
