//! Integration tests: assembling streamed answers from raw chunks
//!
//! Drives `StreamingAnswerAssembler::run` with scripted byte streams the way
//! the HTTP transport would, and checks what an observer sees.

use futures::{stream, StreamExt};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use ragchat_core::{
    AssemblerObserver, AssistantMessageDraft, Completion, CycleOutcome, DraftSnapshot,
    FinalMessage, Frame, FrameDecoder, MessageId, SourceMetadata, SourceRef,
    StreamingAnswerAssembler, TransportFailure,
};

#[derive(Default)]
struct Recorder {
    snapshots: Vec<DraftSnapshot>,
    completed: Vec<FinalMessage>,
    failures: Vec<TransportFailure>,
}

impl AssemblerObserver for Recorder {
    fn on_frame_applied(&mut self, draft: &AssistantMessageDraft) {
        self.snapshots.push(DraftSnapshot::from(draft));
    }

    fn on_cycle_complete(&mut self, message: &FinalMessage) {
        self.completed.push(message.clone());
    }

    fn on_transport_failure(&mut self, failure: &TransportFailure) {
        self.failures.push(failure.clone());
    }
}

impl Recorder {
    fn terminal_events(&self) -> usize {
        self.completed.len() + self.failures.len()
    }
}

fn assembler() -> StreamingAnswerAssembler {
    StreamingAnswerAssembler::new(MessageId::from_millis(1_700_000_000_001))
}

async fn run_chunks(chunks: &[&str], recorder: &mut Recorder) -> CycleOutcome {
    let items: Vec<Result<Vec<u8>, String>> =
        chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
    assembler()
        .run(stream::iter(items), recorder, &CancellationToken::new())
        .await
}

fn chunk(text: &'static str) -> Result<&'static [u8], String> {
    Ok(text.as_bytes())
}

fn source(name: &str) -> SourceRef {
    SourceRef {
        content: format!("{name} excerpt"),
        metadata: SourceMetadata {
            source: name.to_string(),
            page: Some(3),
            original_filename: None,
        },
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_status_split_mid_json_is_reassembled() {
    let mut recorder = Recorder::default();
    run_chunks(&["data: {\"status\":\"Sear", "ching\"}\n"], &mut recorder).await;

    assert_eq!(recorder.snapshots.len(), 1);
    assert_eq!(recorder.snapshots[0].status.as_deref(), Some("Searching"));
    assert_eq!(recorder.snapshots[0].content, "");
}

#[tokio::test]
async fn test_tokens_separated_by_blank_line() {
    let mut recorder = Recorder::default();
    let draft = AssistantMessageDraft::new(MessageId::from_millis(7)).with_status("Initializing...");
    let items = vec![chunk("data: {\"token\":\"Hel\"}\n\ndata: {\"token\":\"lo\"}\n")];

    let outcome = StreamingAnswerAssembler::with_draft(draft)
        .run(stream::iter(items), &mut recorder, &CancellationToken::new())
        .await;

    assert_eq!(recorder.snapshots.len(), 2);
    assert_eq!(recorder.snapshots[0].content, "Hel");
    assert_eq!(recorder.snapshots[0].status, None);
    assert_eq!(recorder.snapshots[1].content, "Hello");

    let CycleOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.content, "Hello");
    assert_eq!(message.completion, Completion::Implicit);
}

#[tokio::test]
async fn test_abort_after_partial_token_reports_transport_failure() {
    let mut recorder = Recorder::default();
    let items = vec![
        chunk("data: {\"token\":\"partial\"}\n"),
        Err("connection reset by peer".to_string()),
    ];

    let outcome = assembler()
        .run(stream::iter(items), &mut recorder, &CancellationToken::new())
        .await;

    assert_eq!(recorder.failures.len(), 1);
    assert!(recorder.failures[0].had_partial_content);
    assert!(recorder.completed.is_empty());

    let CycleOutcome::TransportFailed { failure, draft } = outcome else {
        panic!("expected transport failure");
    };
    assert_eq!(failure.reason, "connection reset by peer");
    assert_eq!(draft.content(), "partial");
}

#[tokio::test]
async fn test_error_frame_finalizes_without_transport_failure() {
    let mut recorder = Recorder::default();
    let outcome = run_chunks(&["data: {\"error\":\"model unavailable\"}\n"], &mut recorder).await;

    assert!(recorder.failures.is_empty());
    assert_eq!(recorder.snapshots.len(), 1);
    assert!(!recorder.snapshots[0].streaming);

    let CycleOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.completion, Completion::Error);
    assert_eq!(message.display_text(), "Error: model unavailable");
    assert_eq!(recorder.completed, vec![message]);
}

// =============================================================================
// Properties over fixed sequences
// =============================================================================

#[tokio::test]
async fn test_malformed_line_does_not_disturb_stream() {
    let mut recorder = Recorder::default();
    let outcome = run_chunks(
        &[
            "data: {\"token\":\"a\"}\n",
            "data: {not json at all\n",
            ": keep-alive\n",
            "event: ping\n",
            "data: {\"token\":\"b\"}\ndata: {\"done\":true}\n",
        ],
        &mut recorder,
    )
    .await;

    assert_eq!(recorder.snapshots.len(), 3);
    let CycleOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.content, "ab");
    assert_eq!(message.completion, Completion::Done);
}

#[tokio::test]
async fn test_tokens_concatenate_around_status_and_sources() {
    let mut recorder = Recorder::default();
    let sources_a = serde_json::to_string(&vec![source("a.pdf"), source("b.pdf")]).unwrap();
    let sources_c = serde_json::to_string(&vec![source("c.pdf")]).unwrap();
    let first = format!("data: {{\"sources\":{sources_a}}}\n");
    let second = format!("data: {{\"sources\":{sources_c}}}\n");

    let outcome = run_chunks(
        &[
            "data: {\"status\":\"Searching\"}\n",
            "data: {\"token\":\"The \"}\n",
            &first,
            "data: {\"status\":\"Reading\"}\ndata: {\"token\":\"answer\"}\n",
            &second,
            "data: {\"token\":\".\"}\ndata: {\"done\":true}\n",
        ],
        &mut recorder,
    )
    .await;

    let CycleOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.content, "The answer.");
    assert_eq!(message.sources, vec![source("c.pdf")]);
}

#[tokio::test]
async fn test_empty_token_keeps_status_label() {
    let mut recorder = Recorder::default();
    let outcome = run_chunks(
        &[
            "data: {\"status\":\"Searching\"}\n",
            "data: {\"token\":\"\"}\ndata: {\"status\":\"\"}\n",
        ],
        &mut recorder,
    )
    .await;

    assert_eq!(recorder.snapshots.len(), 1);
    assert_eq!(recorder.snapshots[0].status.as_deref(), Some("Searching"));
    let CycleOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.content, "");
    assert_eq!(message.completion, Completion::Implicit);
}

#[tokio::test]
async fn test_exactly_one_terminal_event_and_nothing_after() {
    let mut recorder = Recorder::default();
    let outcome = run_chunks(
        &[
            "data: {\"token\":\"x\"}\ndata: {\"done\":true}\n",
            "data: {\"token\":\"late\"}\ndata: {\"error\":\"late\"}\n",
        ],
        &mut recorder,
    )
    .await;

    assert_eq!(recorder.terminal_events(), 1);
    assert_eq!(recorder.snapshots.len(), 2);
    let CycleOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.content, "x");
    assert_eq!(message.error, None);
}

#[tokio::test]
async fn test_stream_ending_without_terminal_frame_completes_once() {
    let mut recorder = Recorder::default();
    run_chunks(&["data: {\"token\":\"a\"}\n", "data: {\"tok"], &mut recorder).await;

    assert_eq!(recorder.terminal_events(), 1);
    assert_eq!(recorder.completed[0].completion, Completion::Implicit);
    assert_eq!(recorder.completed[0].content, "a");
}

#[tokio::test]
async fn test_cancellation_abandons_without_callbacks() {
    let mut recorder = Recorder::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let items = vec![chunk("data: {\"token\":\"x\"}\n")];
    let outcome = assembler()
        .run(stream::iter(items), &mut recorder, &cancel)
        .await;

    assert!(matches!(outcome, CycleOutcome::Abandoned(_)));
    assert!(recorder.snapshots.is_empty());
    assert_eq!(recorder.terminal_events(), 0);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_next_chunk() {
    let mut recorder = Recorder::default();
    let cancel = CancellationToken::new();

    let first = vec![chunk("data: {\"token\":\"hi\"}\n")];
    let chunks = stream::iter(first).chain(stream::pending::<Result<&[u8], String>>());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = assembler().run(chunks, &mut recorder, &cancel).await;

    let CycleOutcome::Abandoned(draft) = outcome else {
        panic!("expected abandonment");
    };
    assert_eq!(draft.content(), "hi");
    assert_eq!(recorder.snapshots.len(), 1);
    assert_eq!(recorder.terminal_events(), 0);
}

// =============================================================================
// Chunk-boundary independence
// =============================================================================

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        4 => any::<String>()
            .prop_filter("empty tokens carry nothing", |text| !text.is_empty())
            .prop_map(|text| Frame::Token { text }),
        1 => "[A-Za-z .]{1,20}".prop_map(|text| Frame::Status { text }),
        1 => proptest::collection::vec("[a-z]{1,8}\\.pdf", 0..3)
            .prop_map(|names| Frame::Sources { items: names.iter().map(|n| source(n)).collect() }),
    ]
}

fn encode(frame: &Frame) -> String {
    let payload = match frame {
        Frame::Token { text } => serde_json::json!({ "token": text }),
        Frame::Status { text } => serde_json::json!({ "status": text }),
        Frame::Sources { items } => serde_json::json!({ "sources": items }),
        Frame::Error { message } => serde_json::json!({ "error": message }),
        Frame::Done => serde_json::json!({ "done": true }),
    };
    format!("data: {payload}\n")
}

fn split_at(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.sort_unstable();
    cuts.dedup();
    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in cuts {
        pieces.push(&bytes[start..cut]);
        start = cut;
    }
    pieces.push(&bytes[start..]);
    pieces
}

proptest! {
    #[test]
    fn test_chunk_boundaries_do_not_change_frames(
        frames in proptest::collection::vec(arb_frame(), 1..12),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
    ) {
        let mut wire = String::new();
        for frame in &frames {
            wire.push_str(&encode(frame));
        }
        wire.push_str(&encode(&Frame::Done));
        let bytes = wire.as_bytes();

        let positions: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len())).collect();

        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for piece in split_at(bytes, positions.clone()) {
            decoded.extend(decoder.decode(piece));
        }
        prop_assert!(!decoder.has_partial());

        let mut expected = frames.clone();
        expected.push(Frame::Done);
        prop_assert_eq!(&decoded, &expected);

        let mut recorder = Recorder::default();
        let mut asm = assembler();
        for piece in split_at(bytes, positions) {
            asm.push_chunk(piece, &mut recorder);
        }
        let message = asm.finish(&mut recorder);

        let expected_content: String = frames
            .iter()
            .filter_map(|f| match f {
                Frame::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(message.content, expected_content);
        prop_assert_eq!(message.completion, Completion::Done);
        prop_assert_eq!(recorder.terminal_events(), 1);
    }
}
