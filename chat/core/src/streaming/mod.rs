//! Streaming Answer Infrastructure
//!
//! Turns the chunked `data:` event stream of an ask request into a single
//! growing assistant message.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                   StreamingAnswerAssembler                        │
//! │                                                                   │
//! │   byte chunks ──► FrameDecoder ──► Frame ──► AssistantMessageDraft │
//! │   (any split)     (utf-8 + lines)   (typed)    (single owner)     │
//! │                                                   │               │
//! │                                     on_frame_applied(&draft)      │
//! │                                                   │               │
//! │                    finish / fail / cancel ──► FinalMessage        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Wire Format
//!
//! Each record is `data: <JSON object>\n` with at most one of `token`,
//! `status`, `sources`, `error`, or `done: true`. Blank lines, comments and
//! anything without the `data: ` prefix are ignored, as are payloads that do
//! not parse.
//!
//! # Example
//!
//! ```ignore
//! use ragchat_core::streaming::{ChannelObserver, StreamingAnswerAssembler};
//! use ragchat_core::MessageId;
//!
//! let (mut observer, mut rx) = ChannelObserver::channel();
//! let assembler = StreamingAnswerAssembler::new(MessageId::now());
//! let outcome = assembler.run(byte_stream, &mut observer, &cancel).await;
//! ```

mod assembler;
mod decoder;
mod draft;
mod frame;

pub use assembler::{
    AssemblerObserver, ChannelObserver, ChunkProgress, CycleOutcome, StreamingAnswerAssembler,
    TransportFailure,
};
pub use decoder::FrameDecoder;
pub use draft::{Applied, AssistantMessageDraft, Completion, FinalMessage};
pub use frame::{Frame, SourceMetadata, SourceRef, DATA_PREFIX};
