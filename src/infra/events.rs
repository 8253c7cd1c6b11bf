//! Server-sent events decoding for the notification channel.

use std::fmt::Display;

use chatlens_api_types::Notification;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::application::remote::{NotificationStream, RemoteError};

const DEFAULT_EVENT: &str = "message";
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Chunks may split lines (and multi-byte characters) anywhere; only complete
/// lines are interpreted. Lines end in `\r\n`, `\n`, or `\r`, and a leading
/// byte order mark is skipped. `id` and `retry` fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    bom_checked: bool,
    /// The previous chunk ended in `\r`; a `\n` opening the next one belongs to it.
    after_cr: bool,
}

impl SseDecoder {
    /// Feed a chunk and return the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut chunk = chunk;
        if self.after_cr && !chunk.is_empty() {
            self.after_cr = false;
            chunk = chunk.strip_prefix(b"\n").unwrap_or(chunk);
        }
        self.buffer.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Vec::new();
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut events = Vec::new();
        while let Some(end) = self
            .buffer
            .iter()
            .position(|&byte| byte == b'\n' || byte == b'\r')
        {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            if line.pop() == Some(b'\r') {
                match self.buffer.first() {
                    Some(b'\n') => {
                        self.buffer.remove(0);
                    }
                    Some(_) => {}
                    None => self.after_cr = true,
                }
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.feed_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

/// Turn a raw byte stream into decoded notifications.
///
/// Events with unknown names or malformed payloads are logged and skipped. A
/// transport error is yielded once and ends the stream.
pub fn notification_stream<S, B, E>(chunks: S) -> NotificationStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::default();
        let mut chunks = Box::pin(chunks);

        while let Some(chunk) = chunks.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    yield Err(RemoteError::transport(err));
                    break;
                }
            };

            for event in decoder.push(bytes.as_ref()) {
                match Notification::decode(&event.event, &event.data) {
                    Ok(notification) => yield Ok(notification),
                    Err(err) => warn!(
                        target = "chatlens::events",
                        event = %event.event,
                        error = %err,
                        "ignoring undecodable notification"
                    ),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::default();
        chunks
            .iter()
            .flat_map(|chunk| decoder.push(chunk))
            .collect()
    }

    #[test]
    fn decodes_named_events() {
        let events = decode_all(&[
            b"event: template_changed\ndata: {\"path\":\"a.jinja\"}\n\nevent: ui_changed\ndata: {}\n\n",
        ]);
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "template_changed".into(),
                    data: r#"{"path":"a.jinja"}"#.into()
                },
                SseEvent {
                    event: "ui_changed".into(),
                    data: "{}".into()
                },
            ]
        );
    }

    #[test]
    fn lines_split_across_chunks() {
        let events = decode_all(&[
            b"eve",
            b"nt: vocabulary_chan",
            b"ged\r\ndata:",
            b"\r\n\r",
            b"\n",
        ]);
        assert_eq!(
            events,
            vec![SseEvent {
                event: "vocabulary_changed".into(),
                data: String::new()
            }]
        );
    }

    #[test]
    fn bare_carriage_returns_end_lines() {
        let events = decode_all(&[b"event: ui_changed\rdata: {}\r\r", b"data: x\r", b"\n\n"]);
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "ui_changed".into(),
                    data: "{}".into()
                },
                SseEvent {
                    event: DEFAULT_EVENT.into(),
                    data: "x".into()
                },
            ]
        );
    }

    #[test]
    fn leading_byte_order_mark_is_skipped() {
        let events = decode_all(&[b"\xEF\xBB", b"\xBFevent: ui_changed\ndata: {}\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "ui_changed");
    }

    #[test]
    fn multibyte_characters_split_across_chunks() {
        let payload = "event: template_changed\ndata: {\"path\":\"模板.jinja\"}\n\n".as_bytes();
        let (head, tail) = payload.split_at(41);
        let events = decode_all(&[head, tail]);
        assert_eq!(events[0].data, r#"{"path":"模板.jinja"}"#);
    }

    #[test]
    fn comments_are_keepalives_and_data_lines_join() {
        let events = decode_all(&[b": ping\n\ndata: one\ndata: two\nid: 7\n\n"]);
        assert_eq!(
            events,
            vec![SseEvent {
                event: DEFAULT_EVENT.into(),
                data: "one\ntwo".into()
            }]
        );
    }

    #[tokio::test]
    async fn stream_skips_unknown_and_stops_on_error() {
        let chunks = stream::iter(vec![
            Ok(b"event: reticulate\ndata: {}\n\n".to_vec()),
            Ok(b"event: template_list_changed\ndata: {}\n\n".to_vec()),
            Err("connection reset"),
            Ok(b"event: ui_changed\ndata: {}\n\n".to_vec()),
        ]);

        let items: Vec<_> = notification_stream(chunks).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(Notification::TemplateListChanged)));
        assert!(matches!(items[1], Err(RemoteError::Transport(_))));
    }
}
