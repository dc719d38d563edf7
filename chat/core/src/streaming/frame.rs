//! Frame Types
//!
//! A frame is one decoded `data:` record from the ask stream. The remote
//! service sends a JSON object per record carrying at most one of `token`,
//! `status`, `sources`, `error`, or `done: true`.

use serde::{Deserialize, Serialize};

/// Prefix every meaningful record starts with
pub const DATA_PREFIX: &str = "data: ";

/// One decoded event from the ask stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Incremental answer text to append
    Token {
        /// The text fragment
        text: String,
    },
    /// Transient progress label ("Searching documents...")
    Status {
        /// The label
        text: String,
    },
    /// Citations for the answer, replacing any earlier set
    Sources {
        /// Ordered citations
        items: Vec<SourceRef>,
    },
    /// Semantic failure reported by the remote reasoning process
    Error {
        /// Error text to show in place of an answer
        message: String,
    },
    /// Terminal success; no further frames follow
    Done,
}

impl Frame {
    /// Whether this frame ends the cycle
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Status { .. } => "status",
            Self::Sources { .. } => "sources",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// Parse the text after the `data: ` prefix
    ///
    /// Returns `None` for anything that is not a recognized JSON object,
    /// including keep-alive payloads and objects carrying none of the known
    /// fields. Empty `error`, `token` and `status` strings count as absent.
    /// When a payload carries several fields the first of `error`, `token`,
    /// `status`, `sources`, `done` wins.
    #[must_use]
    pub fn from_payload(payload: &str) -> Option<Self> {
        let raw: RawPayload = match serde_json::from_str(payload) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unparseable frame payload");
                return None;
            }
        };

        let non_empty = |field: Option<String>| field.filter(|s| !s.is_empty());

        if let Some(message) = non_empty(raw.error) {
            Some(Self::Error { message })
        } else if let Some(text) = non_empty(raw.token) {
            Some(Self::Token { text })
        } else if let Some(text) = non_empty(raw.status) {
            Some(Self::Status { text })
        } else if let Some(items) = raw.sources {
            Some(Self::Sources { items })
        } else if raw.done == Some(true) {
            Some(Self::Done)
        } else {
            None
        }
    }

    /// Parse a complete line, ignoring lines without the data prefix
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        Self::from_payload(payload)
    }
}

/// Wire shape of a record payload
#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    sources: Option<Vec<SourceRef>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: Option<bool>,
}

/// A citation returned by the retrieval backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Retrieved snippet text
    #[serde(default)]
    pub content: String,
    /// Where the snippet came from
    #[serde(default)]
    pub metadata: SourceMetadata,
}

/// Origin of a [`SourceRef`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Originating document identifier
    #[serde(default)]
    pub source: String,
    /// Page number within the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Upload name of the document, when the service provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

impl SourceRef {
    /// Name to show for this citation
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.metadata.original_filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.metadata.source.is_empty() => &self.metadata.source,
            _ => "Document",
        }
    }

    /// Page to show for this citation (pages start at 1)
    #[must_use]
    pub fn display_page(&self) -> u32 {
        self.metadata.page.unwrap_or(1)
    }
}
