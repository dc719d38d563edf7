//! REST payloads exchanged with the RAG service
//!
//! The service owns the persistence format; these types only carry the
//! fields the client reads or sends and tolerate anything extra.

use serde::{Deserialize, Serialize};

use crate::messages::{MessageId, MessageRole};
use crate::streaming::SourceRef;

fn default_temperature() -> f32 {
    0.7
}

fn default_model() -> String {
    "llama3".to_string()
}

/// Editable part of a bot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Display name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// System instructions given to the model
    #[serde(default)]
    pub instructions: String,
    /// Model identifier (e.g. `llama3`)
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl BotConfig {
    /// A bot with default model and temperature
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

/// A stored bot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    /// Server-assigned id
    pub id: String,
    /// Editable settings
    #[serde(flatten)]
    pub config: BotConfig,
    /// Owner uid
    #[serde(default, alias = "creatorId")]
    pub creator_id: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Description and instructions suggested for a bot name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotProfile {
    /// Suggested description
    #[serde(default)]
    pub description: String,
    /// Suggested instructions
    #[serde(default)]
    pub instructions: String,
}

/// An uploaded document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned id
    pub id: String,
    /// File name
    pub name: String,
    /// Coarse kind (`pdf`, `docx`, `txt`, `image`, `other`)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Upload time as sent by the service
    #[serde(default, alias = "uploadedAt")]
    pub uploaded_at: Option<String>,
}

/// Result of an upload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Human-readable summary
    #[serde(default)]
    pub message: Option<String>,
    /// Name the service stored the file under
    #[serde(default)]
    pub original_filename: Option<String>,
    /// Number of indexed chunks
    #[serde(default)]
    pub chunks: Option<u64>,
    /// Extra note (e.g. for images)
    #[serde(default)]
    pub note: Option<String>,
}

/// A message as stored with a chat
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message id
    pub id: MessageId,
    /// Sender
    pub role: MessageRole,
    /// Text
    #[serde(default)]
    pub content: String,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Citations for assistant turns
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

/// A stored chat
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Server-assigned id
    pub id: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Bot answering in this chat (`None` = standard assistant)
    #[serde(default, alias = "botId")]
    pub bot_id: Option<String>,
    /// Transcript
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    /// Documents used as retrieval context
    #[serde(default, alias = "documentIds")]
    pub selected_documents: Vec<String>,
    /// Last update time
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
}

/// Body of a create-chat request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChat {
    /// Title
    pub title: String,
    /// Bot to answer with
    pub bot_id: Option<String>,
    /// Documents to retrieve from
    pub selected_documents: Vec<String>,
}

impl NewChat {
    /// Longest title derived from a question
    pub const MAX_TITLE_CHARS: usize = 50;

    /// A chat titled after the first question asked in it
    #[must_use]
    pub fn from_question(question: &str) -> Self {
        Self {
            title: question.trim().chars().take(Self::MAX_TITLE_CHARS).collect(),
            ..Self::default()
        }
    }
}

/// Body of an update-chat request; unset fields are left alone
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUpdate {
    /// New title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New document selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_documents: Option<Vec<String>>,
    /// New bot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

/// Service health
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the model server behind the service is reachable
    #[serde(default)]
    pub ollama_available: bool,
}

// Response envelopes

#[derive(Deserialize)]
pub(crate) struct BotsEnvelope {
    #[serde(default)]
    pub bots: Vec<Bot>,
}

#[derive(Deserialize)]
pub(crate) struct BotEnvelope {
    pub bot: Bot,
}

#[derive(Deserialize)]
pub(crate) struct ChatsEnvelope {
    #[serde(default)]
    pub chats: Vec<Chat>,
}

#[derive(Deserialize)]
pub(crate) struct ChatEnvelope {
    pub chat: Chat,
}

#[derive(Deserialize)]
pub(crate) struct DocumentsEnvelope {
    #[serde(default)]
    pub documents: Vec<Document>,
}
