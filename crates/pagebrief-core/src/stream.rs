//! Incremental assembly of server-sent-event bodies.
//!
//! Bytes arrive in arbitrary chunks. Complete lines are consumed; the
//! unterminated tail is kept for the next chunk, so the emitted deltas are
//! the same however the body was split.

use crate::providers::{frame_delta, ProviderFamily};
use crate::Error;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug)]
pub struct StreamAssembler {
    family: ProviderFamily,
    /// Unterminated tail of the previous chunk. Kept as bytes so a
    /// multi-byte character split across chunks survives.
    pending: Vec<u8>,
    emitted: String,
    done: bool,
    skipped_frames: usize,
    last_frame_error: Option<Error>,
}

impl StreamAssembler {
    pub fn new(family: ProviderFamily) -> Self {
        Self {
            family,
            pending: Vec::new(),
            emitted: String::new(),
            done: false,
            skipped_frames: 0,
            last_frame_error: None,
        }
    }

    /// Consume one chunk, returning the deltas it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.pending.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.process_line(&line[..line.len() - 1], &mut deltas);
            if self.done {
                self.pending.clear();
                break;
            }
        }
        deltas
    }

    /// End of body: a final unterminated line is still a frame
    pub fn finish(&mut self) -> Vec<String> {
        let mut deltas = Vec::new();
        if !self.done && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.process_line(&line, &mut deltas);
        }
        self.pending.clear();
        deltas
    }

    /// Everything emitted so far
    pub fn emitted(&self) -> &str {
        &self.emitted
    }

    /// The `[DONE]` sentinel has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Why the most recent frame was skipped
    pub fn last_frame_error(&self) -> Option<&Error> {
        self.last_frame_error.as_ref()
    }

    fn process_line(&mut self, raw: &[u8], deltas: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');

        // Blank separators, comments and other SSE fields carry no text
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();
        if payload.is_empty() {
            return;
        }

        if payload == DONE_SENTINEL {
            tracing::debug!(emitted_chars = self.emitted.len(), "Stream finished");
            self.done = true;
            return;
        }

        match frame_delta(self.family, payload) {
            Ok(Some(delta)) => {
                self.emitted.push_str(&delta);
                deltas.push(delta);
            }
            Ok(None) => {}
            Err(e) => {
                let error = Error::StreamFrame(e.to_string());
                self.skipped_frames += 1;
                tracing::warn!(error = %error, "Skipping malformed stream frame");
                self.last_frame_error = Some(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT_BODY: &str = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n\
data: [DONE]\n\n";

    fn run(family: ProviderFamily, chunks: &[&[u8]]) -> (String, bool) {
        let mut assembler = StreamAssembler::new(family);
        let mut out = String::new();
        for chunk in chunks {
            for delta in assembler.feed(chunk) {
                out.push_str(&delta);
            }
        }
        for delta in assembler.finish() {
            out.push_str(&delta);
        }
        assert_eq!(out, assembler.emitted());
        (out, assembler.is_done())
    }

    #[test]
    fn test_single_chunk() {
        let (text, done) = run(ProviderFamily::Chat, &[CHAT_BODY.as_bytes()]);
        assert_eq!(text, "Hello");
        assert!(done);
    }

    #[test]
    fn test_split_at_every_offset() {
        let bytes = CHAT_BODY.as_bytes();
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            let (text, done) = run(ProviderFamily::Chat, &[head, tail]);
            assert_eq!(text, "Hello", "split at {split}");
            assert!(done);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let chunks: Vec<&[u8]> = CHAT_BODY.as_bytes().chunks(1).collect();
        assert_eq!(run(ProviderFamily::Chat, &chunks).0, "Hello");
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9} \u{1f4f0}\"}}]}\n";
        let bytes = body.as_bytes();
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(run(ProviderFamily::Chat, &[head, tail]).0, "caf\u{e9} \u{1f4f0}");
        }
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\
data: {not json\n\
data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\
data: [DONE]\n";
        let mut assembler = StreamAssembler::new(ProviderFamily::Chat);
        let deltas = assembler.feed(body.as_bytes());
        assert_eq!(deltas, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(assembler.skipped_frames(), 1);
        assert!(matches!(
            assembler.last_frame_error(),
            Some(Error::StreamFrame(_))
        ));
        assert!(assembler.is_done());
    }

    #[test]
    fn test_nothing_after_sentinel() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\
data: [DONE]\n\
data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n";
        let (text, done) = run(ProviderFamily::Chat, &[body.as_bytes()]);
        assert_eq!(text, "A");
        assert!(done);
    }

    #[test]
    fn test_crlf_and_non_data_lines() {
        let body = ": keep-alive\r\nevent: message\r\n\
data:{\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n\r\n";
        let (text, done) = run(ProviderFamily::Chat, &[body.as_bytes()]);
        assert_eq!(text, "x");
        assert!(!done);
    }

    #[test]
    fn test_unterminated_last_line_is_processed() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        assert_eq!(run(ProviderFamily::Chat, &[body.as_bytes()]).0, "tail");
    }

    #[test]
    fn test_single_document_frames() {
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"<p>Hi\"}]}}]}\r\n\r\n\
data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"</p>\"}]}}]}\r\n\r\n";
        let (text, done) = run(ProviderFamily::SingleDocument, &[body.as_bytes()]);
        assert_eq!(text, "<p>Hi</p>");
        assert!(!done);
    }
}
