//! Error types for answer cycles

use thiserror::Error;

use crate::backend::TransportError;

/// Errors returned when starting or bookkeeping an answer cycle
#[derive(Debug, Error)]
pub enum ChatError {
    /// An answer is already streaming into this session
    #[error("An answer is already streaming")]
    CycleInProgress,

    /// The question is empty or whitespace
    #[error("Question is empty")]
    EmptyQuestion,

    /// The session is not bound to a stored chat yet
    #[error("Session has no chat id")]
    NoChat,

    /// The ask stream could not be opened
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No streaming assistant turn to update
    #[error("No assistant turn is streaming")]
    NoAssistantTurn,
}
