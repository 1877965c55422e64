use crate::citation::{annotate, AnnotatedText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Plain(String),
    Annotated(AnnotatedText),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub body: MessageBody,
}

#[derive(Debug, Default)]
struct StreamBuffer {
    accumulated: String,
}

/// The conversation plus at most one assistant reply in flight. Streamed
/// chunks accumulate in arrival order; annotation runs exactly once, when
/// the stream completes, and the finished message is never touched again.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    stream: Option<StreamBuffer>,
}

impl Transcript {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, text: String) {
        self.messages.push(ChatMessage {
            sender: Sender::User,
            body: MessageBody::Plain(text),
        });
    }

    /// Appends an assistant-side note outside of any stream, e.g. the
    /// acknowledgment after a document finishes uploading.
    pub fn push_assistant_note(&mut self, text: String) {
        self.messages.push(ChatMessage {
            sender: Sender::Assistant,
            body: MessageBody::Plain(text),
        });
    }

    pub fn begin_assistant(&mut self) {
        self.stream = Some(StreamBuffer::default());
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// The reply accumulated so far, while a stream is open.
    pub fn streamed_so_far(&self) -> Option<&str> {
        self.stream.as_ref().map(|buffer| buffer.accumulated.as_str())
    }

    pub fn apply_delta(&mut self, chunk: &str) {
        if let Some(buffer) = self.stream.as_mut() {
            buffer.accumulated.push_str(chunk);
        }
    }

    /// Closes the stream and appends the annotated reply. An empty reply
    /// leaves the transcript unchanged.
    pub fn complete_stream(&mut self) {
        let Some(buffer) = self.stream.take() else {
            return;
        };
        if buffer.accumulated.is_empty() {
            return;
        }

        self.messages.push(ChatMessage {
            sender: Sender::Assistant,
            body: MessageBody::Annotated(annotate(&buffer.accumulated)),
        });
    }

    /// Discards the stream and replaces the pending bubble with a visible
    /// error marker.
    pub fn fail_stream(&mut self, marker: String) {
        self.stream = None;
        self.messages.push(ChatMessage {
            sender: Sender::Assistant,
            body: MessageBody::Error(marker),
        });
    }
}

/// Incremental UTF-8 decoder for the chat byte stream. A multi-byte
/// scalar split across chunk boundaries is carried over to the next push;
/// genuinely invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    carry: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let mut out = String::new();
        let mut start = 0;
        while start < bytes.len() {
            match std::str::from_utf8(&bytes[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = bytes.len();
                }
                Err(err) => {
                    let valid_up_to = start + err.valid_up_to();
                    out.push_str(
                        std::str::from_utf8(&bytes[start..valid_up_to]).unwrap_or_default(),
                    );
                    start = valid_up_to;

                    match err.error_len() {
                        Some(invalid_len) => {
                            out.push('\u{FFFD}');
                            start += invalid_len;
                        }
                        None => {
                            // Incomplete scalar at the end of the chunk.
                            self.carry = bytes[start..].to_vec();
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes whatever is still carried once the stream ends.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let tail = std::mem::take(&mut self.carry);
        String::from_utf8_lossy(&tail).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageBody, Sender, StreamDecoder, Transcript};

    #[test]
    fn stream_chunks_render_raw_until_completion() {
        let mut transcript = Transcript::default();
        transcript.push_user("Where is the answer?".to_string());
        transcript.begin_assistant();

        transcript.apply_delta("The answer is on ");
        assert_eq!(transcript.streamed_so_far(), Some("The answer is on "));

        transcript.apply_delta("[Page 4].");
        assert_eq!(
            transcript.streamed_so_far(),
            Some("The answer is on [Page 4].")
        );

        transcript.complete_stream();
        assert!(!transcript.is_streaming());

        let last = transcript
            .messages()
            .last()
            .expect("completed reply should be appended");
        assert_eq!(last.sender, Sender::Assistant);
        let MessageBody::Annotated(annotated) = &last.body else {
            panic!("completed reply should be annotated");
        };
        let pages: Vec<u32> = annotated.tokens().map(|token| token.page).collect();
        assert_eq!(pages, vec![4]);
        assert_eq!(annotated.display_text(), "The answer is on [Page 4].");
    }

    #[test]
    fn failed_stream_is_replaced_with_error_marker() {
        let mut transcript = Transcript::default();
        transcript.begin_assistant();
        transcript.apply_delta("partial");

        transcript.fail_stream("Error: could not reach the assistant.".to_string());
        assert!(!transcript.is_streaming());
        assert_eq!(
            transcript.messages().last().map(|message| &message.body),
            Some(&MessageBody::Error(
                "Error: could not reach the assistant.".to_string()
            ))
        );
    }

    #[test]
    fn empty_completion_appends_nothing() {
        let mut transcript = Transcript::default();
        transcript.begin_assistant();
        transcript.complete_stream();
        assert!(transcript.messages().is_empty());

        // A stray completion with no open stream is also a no-op.
        transcript.complete_stream();
        assert!(transcript.messages().is_empty());
    }

    #[test]
    fn deltas_without_an_open_stream_are_dropped() {
        let mut transcript = Transcript::default();
        transcript.apply_delta("orphan chunk");
        assert!(transcript.messages().is_empty());
        assert_eq!(transcript.streamed_so_far(), None);
    }

    #[test]
    fn decoder_joins_a_scalar_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        let bytes = "café".as_bytes();

        let first = decoder.push(&bytes[..4]);
        assert_eq!(first, "caf");

        let second = decoder.push(&bytes[4..]);
        assert_eq!(format!("{first}{second}"), "café");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn decoder_degrades_invalid_bytes_to_replacement() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn decoder_finish_flushes_incomplete_tail() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
