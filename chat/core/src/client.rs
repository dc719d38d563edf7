//! Chat Client
//!
//! Runs one ask/answer cycle end to end: books the turns in the [`Session`],
//! opens the ask stream, drives the assembler and settles the transcript.
//!
//! # Flow
//!
//! ```text
//! ask(question)
//!   │
//!   ├─► Session::begin_cycle          user turn + streaming placeholder
//!   ├─► AskTransport::open_ask_stream  failure → both turns rolled back
//!   ├─► StreamingAnswerAssembler::run
//!   │       every frame ──► Session::sync_draft ──► UI observer
//!   └─► complete / fail / abandon      transcript settled once
//! ```

use tokio_util::sync::CancellationToken;

use crate::backend::{AskTransport, HttpBackend, NewChat};
use crate::config::StreamConfig;
use crate::error::ChatError;
use crate::messages::ChatId;
use crate::session::Session;
use crate::streaming::{
    AssemblerObserver, AssistantMessageDraft, CycleOutcome, FinalMessage,
    StreamingAnswerAssembler, TransportFailure,
};

/// Mirrors every assembler update into the session before passing it on
struct StoreSync<'a, O: ?Sized> {
    session: &'a mut Session,
    observer: &'a mut O,
}

impl<O: AssemblerObserver + ?Sized> AssemblerObserver for StoreSync<'_, O> {
    fn on_frame_applied(&mut self, draft: &AssistantMessageDraft) {
        if let Err(e) = self.session.sync_draft(draft) {
            tracing::warn!(message_id = %draft.id(), error = %e, "Draft update not stored");
        }
        self.observer.on_frame_applied(draft);
    }

    fn on_cycle_complete(&mut self, message: &FinalMessage) {
        if let Err(e) = self.session.complete_cycle(message) {
            tracing::warn!(message_id = %message.id, error = %e, "Final message not stored");
        }
        self.observer.on_cycle_complete(message);
    }

    fn on_transport_failure(&mut self, failure: &TransportFailure) {
        self.session.fail_cycle(failure);
        self.observer.on_transport_failure(failure);
    }
}

/// Drives answer cycles over a transport
#[derive(Clone, Debug)]
pub struct ChatClient<T> {
    transport: T,
    stream: StreamConfig,
}

impl<T: AskTransport> ChatClient<T> {
    /// Create a client
    pub fn new(transport: T, stream: StreamConfig) -> Self {
        Self { transport, stream }
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask a question in `session` and stream the answer
    ///
    /// `observer` sees every frame after the session has stored it. A
    /// transport failure mid-stream is reported through the observer and
    /// returned as [`CycleOutcome::TransportFailed`]; cancellation returns
    /// [`CycleOutcome::Abandoned`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cycle cannot start or the stream cannot be
    /// opened. In the latter case both turns have been rolled back.
    pub async fn ask<O>(
        &self,
        session: &mut Session,
        question: &str,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, ChatError>
    where
        O: AssemblerObserver + ?Sized,
    {
        let chat_id = session.chat_id.clone().ok_or(ChatError::NoChat)?;
        let initial_status = Some(self.stream.initial_status.as_str()).filter(|s| !s.is_empty());
        let (_, assistant_id) = session.begin_cycle(question, initial_status)?;

        let mut draft = AssistantMessageDraft::new(assistant_id);
        if let Some(status) = initial_status {
            draft = draft.with_status(status);
        }

        tracing::info!(
            chat_id = %chat_id,
            message_id = %draft.id(),
            transport = self.transport.name(),
            "Asking"
        );

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.transport.open_ask_stream(&chat_id, question.trim()) => Some(result),
        };

        let mut sync = StoreSync { session, observer };

        let stream = match opened {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to open ask stream");
                sync.on_transport_failure(&TransportFailure::before_open(e.to_string()));
                return Err(ChatError::Transport(e));
            }
            None => {
                sync.session.abandon_cycle(false);
                return Ok(CycleOutcome::Abandoned(draft));
            }
        };

        let outcome = StreamingAnswerAssembler::with_draft(draft)
            .run(stream, &mut sync, cancel)
            .await;

        if matches!(outcome, CycleOutcome::Abandoned(_)) {
            sync.session.abandon_cycle(true);
        }

        Ok(outcome)
    }
}

impl ChatClient<HttpBackend> {
    /// Create the stored chat for an unsaved session
    ///
    /// The chat keeps the session's title, or is titled after `question` when
    /// it has none, and carries the session's bot and document selection.
    /// Does nothing if the session already has a chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the request.
    pub async fn ensure_chat(&self, session: &mut Session, question: &str) -> anyhow::Result<ChatId> {
        if let Some(ref id) = session.chat_id {
            return Ok(id.clone());
        }

        let title = if session.title.trim().is_empty() {
            question
        } else {
            session.title.as_str()
        };
        let new_chat = NewChat {
            bot_id: session.bot_id.clone(),
            selected_documents: session.selected_documents().to_vec(),
            ..NewChat::from_question(title)
        };
        let chat = self.transport.create_chat(&new_chat).await?;

        let id = ChatId::new(chat.id);
        session.chat_id = Some(id.clone());
        session.title = chat.title;
        Ok(id)
    }
}
