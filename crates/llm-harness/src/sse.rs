//! Incremental Server-Sent Events decoder.
//!
//! Chunks may split lines, frames or multi-byte characters anywhere. Bytes are
//! buffered until a `\n` terminates a line, so a character is only decoded
//! once all of its bytes have arrived.

use tracing::warn;

pub(crate) const DONE_SENTINEL: &str = "[DONE]";

/// One complete SSE event unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Output of the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    Frame(SseFrame),
    /// A `data: [DONE]` line was seen.
    Done,
}

#[derive(Default)]
struct PendingFrame {
    event: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl PendingFrame {
    fn take(&mut self) -> Option<SseFrame> {
        let pending = std::mem::take(self);
        if pending.data_lines.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: pending.event,
            data: pending.data_lines.join("\n"),
            id: pending.id,
            retry: pending.retry,
        })
    }
}

/// Line-oriented SSE decoder. One instance per stream.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    pending: PendingFrame,
}

impl SseDecoder {
    /// Appends a chunk and returns every item completed by it.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseItem> {
        self.buf.extend_from_slice(chunk);
        let mut items = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = decode_line(&self.buf[start..end]);
            self.process_line(&line, &mut items);
            start = end + 1;
        }
        self.buf.drain(..start);
        items
    }

    /// Flushes the in-progress frame. Used when the source ends or goes idle.
    ///
    /// An unterminated trailing `data:` line is kept only when its value is
    /// `[DONE]` or parses as JSON. Anything else is a line cut off mid-way and
    /// is dropped.
    pub fn flush(&mut self) -> Vec<SseItem> {
        let mut items = Vec::new();
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = decode_line(&rest);
            if is_complete_tail(&line) {
                self.process_line(&line, &mut items);
            } else {
                warn!(bytes = rest.len(), "dropping truncated sse line");
            }
        }
        if let Some(frame) = self.pending.take() {
            items.push(SseItem::Frame(frame));
        }
        items
    }

    /// Returns true when bytes or fields are buffered awaiting a terminator.
    pub fn has_buffered(&self) -> bool {
        !self.buf.is_empty() || !self.pending.data_lines.is_empty()
    }

    fn process_line(&mut self, line: &str, items: &mut Vec<SseItem>) {
        if line.is_empty() {
            if let Some(frame) = self.pending.take() {
                items.push(SseItem::Frame(frame));
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let value = rest.trim();
            if value == DONE_SENTINEL {
                if let Some(frame) = self.pending.take() {
                    items.push(SseItem::Frame(frame));
                }
                items.push(SseItem::Done);
                return;
            }
            self.pending.data_lines.push(value.to_string());
        } else if let Some(rest) = line.strip_prefix("event:") {
            self.pending.event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("id:") {
            self.pending.id = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("retry:") {
            if let Ok(retry) = rest.trim().parse::<u64>() {
                self.pending.retry = Some(retry);
            }
        }
    }
}

fn is_complete_tail(line: &str) -> bool {
    match line.strip_prefix("data:") {
        Some(rest) => {
            let value = rest.trim();
            value == DONE_SENTINEL || serde_json::from_str::<serde_json::Value>(value).is_ok()
        }
        None => true,
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str) -> SseItem {
        SseItem::Frame(SseFrame {
            data: data.to_string(),
            ..SseFrame::default()
        })
    }

    #[test]
    fn sse_decoder_handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        let part1 = b"data: {\"choices\":[{\"del";
        let part2 = b"ta\":{\"content\":\"Hi\"}}]}\n\n";
        assert!(decoder.push_chunk(part1).is_empty());
        let items = decoder.push_chunk(part2);
        assert_eq!(items, vec![frame(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#)]);
    }

    #[test]
    fn parses_all_fields_and_joins_multiline_data() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(
            b": keepalive\nevent: message\nid: 42\nretry: 1500\ndata: first\ndata: second\nfoo: bar\n\n",
        );
        assert_eq!(
            items,
            vec![SseItem::Frame(SseFrame {
                event: Some("message".into()),
                data: "first\nsecond".into(),
                id: Some("42".into()),
                retry: Some(1500),
            })]
        );
    }

    #[test]
    fn unparsable_retry_is_ignored() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(b"retry: soon\ndata: x\n\n");
        assert_eq!(items, vec![frame("x")]);
    }

    #[test]
    fn frame_without_data_produces_nothing() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"event: ping\nid: 1\n\n").is_empty());
        assert!(decoder.push_chunk(b"\n\n\n").is_empty());
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(b"data: a\r\n\r\ndata: b\r\n\r\n");
        assert_eq!(items, vec![frame("a"), frame("b")]);
    }

    #[test]
    fn done_sentinel_is_signalled_immediately() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(b"data: one\n\ndata: [DONE]\n");
        assert_eq!(items, vec![frame("one"), SseItem::Done]);
    }

    #[test]
    fn done_sentinel_flushes_in_progress_fields_first() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(b"data: partial\ndata: [DONE]\n\n");
        assert_eq!(items, vec![frame("partial"), SseItem::Done]);
    }

    #[test]
    fn flush_emits_unterminated_frame() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(br#"data: {"text":"tail"}"#).is_empty());
        assert!(decoder.has_buffered());
        assert_eq!(decoder.flush(), vec![frame(r#"{"text":"tail"}"#)]);
        assert!(!decoder.has_buffered());
        assert!(decoder.flush().is_empty());
    }

    #[test]
    fn flush_keeps_unterminated_done_sentinel() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"data: [DONE]").is_empty());
        assert_eq!(decoder.flush(), vec![SseItem::Done]);
    }

    #[test]
    fn flush_drops_truncated_line_but_keeps_completed_lines() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(b"data: {\"text\":\"a\"}\ndata: {\"choices\":[{\"del");
        assert!(items.is_empty());
        assert_eq!(decoder.flush(), vec![frame(r#"{"text":"a"}"#)]);
        assert!(!decoder.has_buffered());

        let mut decoder = SseDecoder::default();
        assert!(decoder.push_chunk(b"data: cut off plain tex").is_empty());
        assert!(decoder.flush().is_empty());
    }

    #[test]
    fn many_frames_in_one_chunk_keep_order() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push_chunk(b"data: 1\n\ndata: 2\n\ndata: 3\n\ndata: 4");
        assert_eq!(items, vec![frame("1"), frame("2"), frame("3")]);
        assert_eq!(decoder.flush(), vec![frame("4")]);
    }

    #[test]
    fn chunk_boundaries_do_not_change_decoded_frames() {
        let input = "event: delta\ndata: {\"choices\":[{\"delta\":{\"content\":\"héllo 世界 🦀\"}}]}\n\n\
                     : comment\r\ndata: line one\r\ndata: line two\r\nid: 7\r\n\r\n\
                     data: not json ✓\n\ndata: [DONE]\n\n";
        let bytes = input.as_bytes();

        let mut whole = SseDecoder::default();
        let mut expected = whole.push_chunk(bytes);
        expected.extend(whole.flush());
        assert_eq!(expected.len(), 4);

        for split in 0..=bytes.len() {
            let mut decoder = SseDecoder::default();
            let mut items = decoder.push_chunk(&bytes[..split]);
            items.extend(decoder.push_chunk(&bytes[split..]));
            items.extend(decoder.flush());
            assert_eq!(items, expected, "split at byte {split}");
        }

        let mut decoder = SseDecoder::default();
        let mut items = Vec::new();
        for byte in bytes {
            items.extend(decoder.push_chunk(std::slice::from_ref(byte)));
        }
        items.extend(decoder.flush());
        assert_eq!(items, expected, "byte-at-a-time");
    }
}
