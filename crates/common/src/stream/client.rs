//! Async event-stream consumer
//!
//! Reads a chunked byte transport through the record framer and yields
//! parsed `StreamEvent`s over a channel. Malformed records are dropped
//! with a warning; the stream ends after the terminal event, when the
//! transport closes, or when the receiver is dropped (client abort).

use super::event::StreamEvent;
use super::framer::{sse_data, RecordFramer};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

pub struct EventStreamClient;

impl EventStreamClient {
    /// Consume a byte stream, yielding events in emission order.
    pub fn consume<S, E>(byte_stream: S) -> mpsc::Receiver<StreamEvent>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
        E: std::fmt::Display + Send,
    {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut byte_stream = byte_stream;
            let mut framer = RecordFramer::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::error!(error = %e, "Transport error on event stream");
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                for record in framer.push(&chunk) {
                    match parse_record(&record) {
                        Some(event) => {
                            let terminal = event.is_terminal();
                            if tx.send(event).await.is_err() {
                                tracing::debug!("Event receiver dropped, stopping consumer");
                                return;
                            }
                            if terminal {
                                return;
                            }
                        }
                        None => continue,
                    }
                }
            }

            // The transport may close with a final unterminated record
            if let Some(record) = framer.finish() {
                if let Some(event) = parse_record(&record) {
                    let _ = tx.send(event).await;
                }
            }
        });

        rx
    }
}

/// Parse one framed record into a stream event.
///
/// Records without a data payload (heartbeats) and records that do not
/// parse as a known event type are dropped, keeping the stream resilient
/// against transport noise.
fn parse_record(record: &str) -> Option<StreamEvent> {
    let payload = sse_data(record)?;
    match serde_json::from_str::<StreamEvent>(&payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(
                payload = %payload,
                error = %e,
                "Dropping malformed stream record"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn byte_stream(
        chunks: Vec<&'static [u8]>,
    ) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Unpin {
        futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(rx: &mut mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_events_reassembled_across_reads() {
        let stream = byte_stream(vec![
            b"data: {\"type\":\"thought\",\"data\":\"A\"}\n\ndata: {\"type\":\"tok",
            b"en\",\"data\":\"X\"}\n\n",
            b"data: {\"type\":\"done\",\"data\":{\"sources\":[]}}\n\n",
        ]);
        let mut rx = EventStreamClient::consume(stream);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Thought(s) if s == "A"));
        assert!(matches!(&events[1], StreamEvent::Token(s) if s == "X"));
        assert!(events[2].is_terminal());
    }

    #[tokio::test]
    async fn test_malformed_record_dropped_stream_continues() {
        let stream = byte_stream(vec![
            b"data: {not json}\n\n",
            b"data: {\"type\":\"token\",\"data\":\"ok\"}\n\n",
            b"data: {\"type\":\"done\",\"data\":{\"sources\":[]}}\n\n",
        ]);
        let mut rx = EventStreamClient::consume(stream);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Token(s) if s == "ok"));
    }

    #[tokio::test]
    async fn test_stops_after_terminal_event() {
        let stream = byte_stream(vec![
            b"data: {\"type\":\"error\",\"data\":\"boom\"}\n\ndata: {\"type\":\"token\",\"data\":\"late\"}\n\n",
        ]);
        let mut rx = EventStreamClient::consume(stream);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(_)));
    }

    #[tokio::test]
    async fn test_heartbeats_ignored() {
        let stream = byte_stream(vec![
            b": keep-alive\n\ndata: {\"type\":\"done\",\"data\":{\"sources\":[]}}\n\n",
        ]);
        let mut rx = EventStreamClient::consume(stream);
        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 1);
    }
}
