use crate::events::{decode_event, DecodeError, ProtocolEvent};

/// Incremental parser for the text event stream.
///
/// Feed raw connection bytes in whatever chunk sizes the transport delivers;
/// complete frames are drained as decoded events, malformed frames as
/// [`DecodeError`] items in stream order. Partial trailing data — including a
/// multi-byte UTF-8 code point split across reads — is buffered for the next
/// `feed`, never discarded. A fresh parser is required per stream attempt.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: String,
    pending_bytes: Vec<u8>,
}

impl EventStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<ProtocolEvent, DecodeError>> {
        self.push_bytes(bytes);

        let mut parsed = Vec::new();
        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            if let Some(payload) = extract_data_payload(&frame) {
                parsed.push(decode_event(&payload));
            }
        }

        parsed
    }

    /// Parse a complete stream body in one shot.
    pub fn parse_frames(input: &str) -> Vec<Result<ProtocolEvent, DecodeError>> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    #[must_use]
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty() && self.pending_bytes.is_empty()
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.pending_bytes.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    self.pending_bytes.clear();
                    return;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid_up_to]));

                    match error.error_len() {
                        // Incomplete code point at the end of the chunk: keep
                        // the tail for the next read.
                        None => {
                            self.pending_bytes.drain(0..valid_up_to);
                            return;
                        }
                        Some(invalid_len) => {
                            self.buffer.push('\u{FFFD}');
                            self.pending_bytes.drain(0..valid_up_to + invalid_len);
                        }
                    }
                }
            }
        }
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
