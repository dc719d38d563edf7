//! Frame Decoder
//!
//! Turns raw byte chunks into [`Frame`]s. Chunks carry no alignment to
//! records: a record may be split across reads, a read may carry several
//! records, and a multi-byte character may straddle two reads.

use super::frame::Frame;

/// Incremental decoder from byte chunks to frames
///
/// Holds the undecoded tail of an incomplete UTF-8 sequence plus the text of
/// the current, not yet terminated, line.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of a character whose remaining bytes have not arrived yet
    pending_bytes: Vec<u8>,
    /// Text after the last newline seen so far
    line_buf: String,
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the frames of every line it completed
    ///
    /// Lines without the `data: ` prefix and payloads that fail to parse are
    /// dropped here; they never reach the caller.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.push_bytes(chunk);

        let Some(last_newline) = self.line_buf.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.line_buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.line_buf, rest);

        // `lines` also strips the `\r` of CRLF-terminated records
        complete.lines().filter_map(Frame::from_line).collect()
    }

    /// Whether a partial line or character is buffered
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.line_buf.is_empty() || !self.pending_bytes.is_empty()
    }

    /// End of input: drop whatever partial record is left
    ///
    /// Returns the number of bytes discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.line_buf.len() + self.pending_bytes.len();
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "Discarding trailing partial frame");
        }
        self.line_buf.clear();
        self.pending_bytes.clear();
        discarded
    }

    /// Decode bytes as UTF-8, carrying an incomplete trailing sequence over
    /// to the next chunk. Invalid sequences become U+FFFD.
    fn push_bytes(&mut self, chunk: &[u8]) {
        let joined;
        let mut input: &[u8] = if self.pending_bytes.is_empty() {
            chunk
        } else {
            self.pending_bytes.extend_from_slice(chunk);
            joined = std::mem::take(&mut self.pending_bytes);
            &joined
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.line_buf.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    self.line_buf
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match e.error_len() {
                        Some(len) => {
                            self.line_buf.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            self.pending_bytes = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(text: &str) -> Frame {
        Frame::Token {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(b"data: {\"status\":\"Sear").is_empty());
        assert!(decoder.has_partial());
        assert_eq!(
            decoder.decode(b"ching\"}\n"),
            vec![Frame::Status {
                text: "Searching".to_string()
            }]
        );
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(b"data: {\"token\":\"Hel\"}\n\ndata: {\"token\":\"lo\"}\n");
        assert_eq!(frames, vec![token("Hel"), token("lo")]);
    }

    #[test]
    fn test_crlf_records() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(b"data: {\"token\":\"a\"}\r\n\r\ndata: {\"done\":true}\r\n");
        assert_eq!(frames, vec![token("a"), Frame::Done]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let record = "data: {\"token\":\"héllo 日本\"}\n".as_bytes();
        // Split inside the three-byte encoding of '日'
        let split = record
            .windows(3)
            .position(|w| w == "日".as_bytes())
            .unwrap()
            + 1;

        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&record[..split]).is_empty());
        assert_eq!(decoder.decode(&record[split..]), vec![token("héllo 日本")]);
    }

    #[test]
    fn test_invalid_bytes_become_replacement_character() {
        let mut decoder = FrameDecoder::new();
        let mut record = b"data: {\"token\":\"a".to_vec();
        record.push(0xFF);
        record.extend_from_slice(b"b\"}\n");
        assert_eq!(decoder.decode(&record), vec![token("a\u{FFFD}b")]);
    }

    #[test]
    fn test_trailing_partial_frame_discarded() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(b"data: {\"token\":\"x\"}\ndata: {\"tok"), vec![token("x")]);
        assert_eq!(decoder.finish(), "data: {\"tok".len());
        assert!(!decoder.has_partial());
        assert_eq!(decoder.finish(), 0);
    }

    #[test]
    fn test_unterminated_complete_record_is_still_partial() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(b"data: {\"done\":true}").is_empty());
        assert!(decoder.finish() > 0);
    }

    #[test]
    fn test_noise_lines_skipped_between_frames() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(
            b": ping\n\nretry: 1000\ndata: not json\ndata: {\"token\":\"ok\"}\nevent: x\n",
        );
        assert_eq!(frames, vec![token("ok")]);
    }
}
