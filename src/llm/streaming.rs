//! Server-Sent Events decoding shared by the provider client and the chat client
//!
//! Both directions of this application speak SSE: the provider streams
//! completion chunks to the server, and the server streams UI message chunks
//! to the client. Only `data:` fields matter to either side.

/// Incremental Server-Sent Events decoder
///
/// Bytes are buffered until a full line is available, so events and multi-byte
/// characters may be split across chunks. Consecutive `data:` lines of one
/// event are joined with `\n`; an empty line dispatches the event.
///
/// # Example
/// ```
/// use streamchat::llm::streaming::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
///
/// assert_eq!(decoder.push(b"data: {\"text\":\"hel"), Vec::<String>::new());
/// assert_eq!(decoder.push(b"lo\"}\n\n"), vec!["{\"text\":\"hello\"}"]);
///
/// // Final event without trailing blank line
/// assert!(decoder.push(b"data: [DONE]").is_empty());
/// assert_eq!(decoder.finish(), vec!["[DONE]"]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and return the data payload of every completed event
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            self.process_line(&line, &mut payloads);
        }

        payloads
    }

    /// Flush buffered content at end of stream
    ///
    /// A trailing line without newline and any undispatched data lines are
    /// treated as one final event.
    pub fn finish(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();

        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            for line in rest.lines() {
                self.process_line(line, &mut payloads);
            }
        }
        self.dispatch(&mut payloads);

        payloads
    }

    fn process_line(&mut self, line: &str, payloads: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(payloads);
            return;
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.data_lines.push(value.to_string());
        }
    }

    fn dispatch(&mut self, payloads: &mut Vec<String>) {
        if self.data_lines.is_empty() {
            return;
        }
        payloads.push(self.data_lines.join("\n"));
        self.data_lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_event() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"hello\":\"world\"}\n\n");
        assert_eq!(payloads, vec!["{\"hello\":\"world\"}"]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\r\n\r\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: line one\ndata: line two\n\n");
        assert_eq!(payloads, vec!["line one\nline two"]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let payloads =
            decoder.push(b": keep-alive\nevent: message\nid: 7\ndata: {\"x\":1}\n\n");
        assert_eq!(payloads, vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: √2\n\n".as_bytes();
        // '√' is three bytes; split in the middle of it
        let split = "data: ".len() + 1;
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["√2"]);
    }

    #[test]
    fn test_finish_flushes_and_clears() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}"), vec!["{\"a\":1}"]);
        assert_eq!(decoder.finish(), vec!["{\"b\":2}"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_data_without_space() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data:[DONE]\n\n"), vec!["[DONE]"]);
    }
}
