//! Streaming Answer Assembler
//!
//! Folds the byte stream of one ask request into a single assistant draft,
//! notifying an [`AssemblerObserver`] after every state change.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::decoder::FrameDecoder;
use super::draft::{Applied, AssistantMessageDraft, FinalMessage};
use super::frame::Frame;
use crate::messages::{AssemblerEvent, DraftSnapshot, MessageId};

/// Receives the assembler's updates
///
/// Callbacks run synchronously on the assembler's task, one per applied
/// frame, so a chunk carrying three frames yields three calls.
pub trait AssemblerObserver {
    /// A recognized frame changed the draft
    fn on_frame_applied(&mut self, draft: &AssistantMessageDraft);

    /// The cycle finished through `done`, implicit completion, or `error`
    ///
    /// Called exactly once per completed cycle; the owned message is returned
    /// to whoever drove the assembler.
    fn on_cycle_complete(&mut self, message: &FinalMessage);

    /// The byte stream broke before the cycle could finish
    fn on_transport_failure(&mut self, failure: &TransportFailure);
}

/// A transport-level failure of one cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFailure {
    /// Human-readable cause
    pub reason: String,
    /// Whether any answer text had arrived
    pub had_partial_content: bool,
    /// Whether the stream had been opened at all
    pub stream_opened: bool,
}

impl TransportFailure {
    /// Failure to open the stream; nothing was received
    pub fn before_open(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            had_partial_content: false,
            stream_opened: false,
        }
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

/// Result of running one cycle to its end
#[derive(Debug)]
pub enum CycleOutcome {
    /// Done, implicit completion, or semantic error
    Completed(FinalMessage),
    /// The byte stream failed; the draft is returned as it stood
    TransportFailed {
        /// What went wrong
        failure: TransportFailure,
        /// The unfinished draft
        draft: AssistantMessageDraft,
    },
    /// The caller cancelled; no terminal callback was issued
    Abandoned(AssistantMessageDraft),
}

/// Whether more chunks are wanted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkProgress {
    /// Keep reading
    Continue,
    /// A terminal frame arrived; stop reading
    Terminal,
}

/// Assembles one streamed answer
///
/// Owns the decoder and the single live draft. Consumed by [`finish`],
/// [`fail`], or [`run`], so a cycle can only end once.
///
/// [`finish`]: StreamingAnswerAssembler::finish
/// [`fail`]: StreamingAnswerAssembler::fail
/// [`run`]: StreamingAnswerAssembler::run
#[derive(Debug)]
pub struct StreamingAnswerAssembler {
    decoder: FrameDecoder,
    draft: AssistantMessageDraft,
    frames_applied: usize,
}

impl StreamingAnswerAssembler {
    /// Start a cycle for the assistant message `id`
    #[must_use]
    pub fn new(id: MessageId) -> Self {
        Self::with_draft(AssistantMessageDraft::new(id))
    }

    /// Start a cycle from a prepared draft (e.g. with an initial status)
    #[must_use]
    pub fn with_draft(draft: AssistantMessageDraft) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            draft,
            frames_applied: 0,
        }
    }

    /// The live draft
    #[must_use]
    pub fn draft(&self) -> &AssistantMessageDraft {
        &self.draft
    }

    /// Number of frames that changed the draft
    #[must_use]
    pub fn frames_applied(&self) -> usize {
        self.frames_applied
    }

    /// Decode a chunk and apply each frame it completes
    pub fn push_chunk<O>(&mut self, chunk: &[u8], observer: &mut O) -> ChunkProgress
    where
        O: AssemblerObserver + ?Sized,
    {
        for frame in self.decoder.decode(chunk) {
            self.apply(frame, observer);
        }

        if self.draft.is_streaming() {
            ChunkProgress::Continue
        } else {
            ChunkProgress::Terminal
        }
    }

    /// Apply a single decoded frame
    pub fn apply<O>(&mut self, frame: Frame, observer: &mut O) -> Applied
    where
        O: AssemblerObserver + ?Sized,
    {
        let applied = self.draft.apply(frame);
        if applied != Applied::Ignored {
            self.frames_applied += 1;
            observer.on_frame_applied(&self.draft);
        }
        applied
    }

    /// End of input: finalize the draft and hand it over
    ///
    /// A trailing partial record is discarded. Without a terminal frame the
    /// cycle completes implicitly.
    pub fn finish<O>(mut self, observer: &mut O) -> FinalMessage
    where
        O: AssemblerObserver + ?Sized,
    {
        self.decoder.finish();

        if self.draft.is_streaming() {
            tracing::debug!(
                message_id = %self.draft.id(),
                "Stream closed without a terminal frame, completing"
            );
        }

        let message = self.draft.finalize();
        tracing::info!(
            message_id = %message.id,
            completion = ?message.completion,
            frames = self.frames_applied,
            content_len = message.content.len(),
            "Answer cycle complete"
        );
        observer.on_cycle_complete(&message);
        message
    }

    /// The byte stream failed mid-cycle
    ///
    /// A draft that already reached a terminal frame is completed normally;
    /// the late transport error is irrelevant to it.
    pub fn fail<O>(self, reason: impl Into<String>, observer: &mut O) -> CycleOutcome
    where
        O: AssemblerObserver + ?Sized,
    {
        if !self.draft.is_streaming() {
            return CycleOutcome::Completed(self.finish(observer));
        }

        let failure = TransportFailure {
            reason: reason.into(),
            had_partial_content: self.draft.has_content(),
            stream_opened: true,
        };
        tracing::warn!(
            message_id = %self.draft.id(),
            reason = %failure.reason,
            partial = failure.had_partial_content,
            "Answer stream failed"
        );
        observer.on_transport_failure(&failure);

        CycleOutcome::TransportFailed {
            failure,
            draft: self.draft,
        }
    }

    /// Drive the cycle from a byte stream until it ends
    ///
    /// Reading stops at the first terminal frame, at end of input, on a
    /// stream error, or when `cancel` fires. The stream is dropped on return,
    /// which releases the underlying connection.
    pub async fn run<S, B, E, O>(
        mut self,
        stream: S,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> CycleOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
        O: AssemblerObserver + ?Sized,
    {
        let mut stream = std::pin::pin!(stream);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!(message_id = %self.draft.id(), "Answer cycle abandoned");
                    return CycleOutcome::Abandoned(self.draft);
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    if self.push_chunk(chunk.as_ref(), observer) == ChunkProgress::Terminal {
                        break;
                    }
                }
                Some(Err(e)) => return self.fail(e.to_string(), observer),
                None => break,
            }
        }

        CycleOutcome::Completed(self.finish(observer))
    }
}

/// Forwards assembler updates to another task as [`AssemblerEvent`]s
///
/// Unbounded so that no status update is dropped; a closed receiver means
/// the surface stopped listening and further events are discarded.
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<AssemblerEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver its events arrive on
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AssemblerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: AssemblerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Surface receiver dropped, discarding assembler event");
        }
    }
}

impl AssemblerObserver for ChannelObserver {
    fn on_frame_applied(&mut self, draft: &AssistantMessageDraft) {
        self.send(AssemblerEvent::FrameApplied(DraftSnapshot::from(draft)));
    }

    fn on_cycle_complete(&mut self, message: &FinalMessage) {
        self.send(AssemblerEvent::CycleComplete(message.clone()));
    }

    fn on_transport_failure(&mut self, failure: &TransportFailure) {
        self.send(AssemblerEvent::TransportFailure(failure.clone()));
    }
}
