//! Ask Transport Traits
//!
//! The assembler only needs one thing from the network: a byte stream for an
//! ask request. This trait lets the client run against the HTTP service, a
//! scripted stream in tests, or any other transport without changing the
//! cycle logic.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use crate::messages::ChatId;

/// Raw response body of an ask request
///
/// Dropping the stream aborts the request and releases the connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never reached the service
    #[error("Failed to reach {url}: {message}")]
    Connect {
        /// Target URL
        url: String,
        /// Underlying error text
        message: String,
    },

    /// The service answered with a non-success status
    #[error("Service returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// Reading the response body failed mid-stream
    #[error("Stream read failed: {0}")]
    Read(String),
}

impl TransportError {
    /// Whether repeating the request may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Read(_) => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
        }
    }
}

/// Opens ask streams
#[async_trait]
pub trait AskTransport: Send + Sync {
    /// Transport name for logs (e.g. "HTTP")
    fn name(&self) -> &str;

    /// Submit a question to a chat and return the response body as bytes
    ///
    /// Errors here mean the stream never opened.
    async fn open_ask_stream(
        &self,
        chat_id: &ChatId,
        question: &str,
    ) -> Result<ByteStream, TransportError>;
}
